//! Two-valued result of executing a request.

use std::fmt;

use serde_json::{Value, json};

use crate::model::ModelInstance;
use crate::transport::RawResponse;

/// Successful response data, raw or modeled
#[derive(Debug, Clone)]
pub enum Payload {
    Raw(Value),
    Model(ModelInstance),
}

impl Payload {
    pub fn as_model(&self) -> Option<&ModelInstance> {
        match self {
            Payload::Model(instance) => Some(instance),
            Payload::Raw(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Payload::Raw(value) => value.clone(),
            Payload::Model(instance) => instance.to_value(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Raw(value) => value,
            Payload::Model(instance) => instance.into_value(),
        }
    }
}

/// Describes a response the server refused with a non-success status
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDetails {
    pub status: u16,
    pub reason: Option<String>,
    pub text: String,
}

impl FailureDetails {
    pub fn to_value(&self) -> Value {
        json!({
            "status": self.status,
            "reason": self.reason,
            "text": self.text,
        })
    }
}

impl From<RawResponse> for FailureDetails {
    fn from(raw: RawResponse) -> Self {
        Self {
            text: raw.text(),
            status: raw.status,
            reason: raw.reason,
        }
    }
}

impl fmt::Display for FailureDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "HTTP {} {}", self.status, reason),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

/// Outcome of [`Request::call`](super::Request::call)
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Success(Payload),
    /// Soft failure: the call went through but the server answered with an error status
    Failure(FailureDetails),
}

impl CallOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            CallOutcome::Success(payload) => Some(payload),
            CallOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureDetails> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure(details) => Some(details),
        }
    }

    /// Flatten into the `(payload, ok)` pair; a failure's payload describes the response.
    pub fn into_parts(self) -> (Value, bool) {
        match self {
            CallOutcome::Success(payload) => (payload.into_value(), true),
            CallOutcome::Failure(details) => (details.to_value(), false),
        }
    }
}

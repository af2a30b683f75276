//! Error handling for the apibind runtime binding layer.
//!
//! This module defines the `Error` type used throughout the library, along
//! with a convenient `Result` alias. Ordinary HTTP-level failures are *not*
//! errors here: they travel through [`CallOutcome::Failure`](crate::CallOutcome)
//! so callers can branch on them. Everything in this enum is fatal to the
//! operation that raised it.
//!
//! # Examples
//!
//! ```
//! use apibind::error::{Error, Result};
//!
//! fn lookup_model(name: &str) -> Result<()> {
//!     Err(Error::lookup(format!("no definition named '{name}'")))
//! }
//!
//! assert!(matches!(lookup_model("Vlan"), Err(Error::Lookup(_))));
//! ```

use thiserror::Error;

/// Result type for apibind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for apibind operations
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown model name, operation, resource or path
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Unsupported or malformed shape definition
    #[error("Shape error: {0}")]
    Shape(String),

    /// An indexer could not obtain data from its request
    #[error("Operational error: {0}")]
    Operational(String),

    /// A structural guarantee would be violated (duplicate ids, missing shapes)
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// A model property assignment or instance does not satisfy its shape
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure other than an HTTP status error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded for its declared content type
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new lookup error
    pub fn lookup<S: Into<String>>(msg: S) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a new shape error
    pub fn shape<S: Into<String>>(msg: S) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a new operational error
    pub fn operational<S: Into<String>>(msg: S) -> Self {
        Self::Operational(msg.into())
    }

    /// Create a new invariant violation
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }
}

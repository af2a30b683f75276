//! Descriptor types for an API description.
//!
//! Shapes stay as raw JSON-schema values; only the operation graph is typed.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// A structural description of a data value, as found in the description document.
pub type ShapeDefinition = Value;

/// HTTP methods an operation can be declared under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl HttpMethod {
    /// All methods, in the order path items are scanned
    pub fn all() -> &'static [HttpMethod] {
        &[
            HttpMethod::Get,
            HttpMethod::Put,
            HttpMethod::Post,
            HttpMethod::Delete,
            HttpMethod::Options,
            HttpMethod::Head,
            HttpMethod::Patch,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::all()
            .iter()
            .copied()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::lookup(format!("unknown HTTP method '{}'", s)))
    }
}

/// Where a parameter travels in the HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    FormData,
    Body,
}

impl FromStr for ParameterLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "cookie" => Ok(ParameterLocation::Cookie),
            "formData" => Ok(ParameterLocation::FormData),
            "body" => Ok(ParameterLocation::Body),
            other => Err(Error::shape(format!(
                "invalid parameter location '{}'",
                other
            ))),
        }
    }
}

/// One declared operation parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// Body parameters carry their shape here; others carry their value schema.
    pub schema: Option<ShapeDefinition>,
    pub description: Option<String>,
}

/// A declared response for one status code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    pub status_code: String,
    pub description: Option<String>,
    pub schema: Option<ShapeDefinition>,
}

/// One remote-callable action of the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Identifier-safe operation name used for attribute-style dispatch
    pub name: String,
    /// The `operationId` as written in the document, if any
    pub operation_id: Option<String>,
    pub method: HttpMethod,
    pub path: String,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    /// Declared responses keyed by status code (`"200"`, `"default"`, ...)
    pub responses: IndexMap<String, ResponseDescriptor>,
}

impl OperationDescriptor {
    /// The single body-located parameter, if the operation has one
    pub fn body_parameter(&self) -> Option<&ParameterDescriptor> {
        self.parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Declared response shape for a status code, falling back to `default`
    pub fn response_shape(&self, status_code: &str) -> Option<&ShapeDefinition> {
        self.responses
            .get(status_code)
            .or_else(|| self.responses.get("default"))
            .and_then(|r| r.schema.as_ref())
    }

    /// Declared response shape for exactly this status code
    pub fn declared_response_shape(&self, status_code: &str) -> Option<&ShapeDefinition> {
        self.responses
            .get(status_code)
            .and_then(|r| r.schema.as_ref())
    }
}

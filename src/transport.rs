//! Execution primitive behind every request.
//!
//! [`Transport`] is the seam to the network: given an operation and its
//! assembled arguments it performs the call. HTTP status failures come back as
//! [`TransportError::Status`] so the request layer can turn them into soft
//! failures; undecodable bodies are [`TransportError::Decode`] and everything
//! else is [`TransportError::Other`].

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::ClientConfig;
use crate::content::{self, ContentFamily};
use crate::error::{Error, Result};
use crate::spec::{OperationDescriptor, ParameterLocation};

/// Call arguments keyed by parameter name
pub type Arguments = Map<String, Value>;

/// The HTTP response as received
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A successful transport call
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Decoded payload, present when the operation declares a response shape for the status
    pub payload: Option<Value>,
    pub raw: RawResponse,
}

/// Errors a transport can report
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server answered with a non-success status
    #[error("HTTP {} {}", .0.status, .0.reason.as_deref().unwrap_or(""))]
    Status(RawResponse),

    /// A body that claims a known content type but does not decode
    #[error("{0}")]
    Decode(String),

    /// The call could not be made or its arguments could not be mapped
    #[error("{0}")]
    Other(String),
}

/// Performs the network call for one operation
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        op: &OperationDescriptor,
        args: &Arguments,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport for `config`; `base_path` is the document's `basePath`, if any.
    pub fn new(config: &ClientConfig, base_path: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in config.default_headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::transport(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::transport(format!("invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::transport(format!("failed to create HTTP client: {}", e)))?;

        let mut base_url = config.base_url().clone();
        if let Some(base_path) = base_path {
            let mut segments = base_url
                .path_segments_mut()
                .map_err(|_| Error::transport(format!("base URL {} cannot carry a path", config.base_url())))?;
            segments
                .pop_if_empty()
                .extend(base_path.split('/').filter(|s| !s.is_empty()));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the request URL: path parameters substituted, query parameters appended.
    pub fn request_url(
        &self,
        op: &OperationDescriptor,
        args: &Arguments,
    ) -> std::result::Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TransportError::Other(format!("base URL {} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in op.path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&substitute_path_params(segment, args)?);
            }
            if op.path.len() > 1 && op.path.ends_with('/') {
                segments.push("");
            }
        }

        let query: Vec<(String, String)> = op
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
            .filter_map(|p| args.get(&p.name).map(|v| (p, v)))
            .flat_map(|(p, v)| {
                let multi = p
                    .schema
                    .as_ref()
                    .and_then(|s| s.get("collectionFormat"))
                    .and_then(Value::as_str)
                    == Some("multi");
                match v {
                    Value::Array(items) if multi => items
                        .iter()
                        .map(|item| (p.name.clone(), param_string(item)))
                        .collect::<Vec<_>>(),
                    _ => vec![(p.name.clone(), param_string(v))],
                }
            })
            .collect();

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        op: &OperationDescriptor,
        args: &Arguments,
    ) -> std::result::Result<TransportResponse, TransportError> {
        check_arguments(op, args)?;

        let url = self.request_url(op, args)?;
        let method = reqwest::Method::from_bytes(op.method.as_str().to_uppercase().as_bytes())
            .map_err(|e| TransportError::Other(e.to_string()))?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        let mut form: Vec<(String, String)> = Vec::new();
        for param in &op.parameters {
            let Some(value) = args.get(&param.name) else {
                continue;
            };
            match param.location {
                ParameterLocation::Header => {
                    request = request.header(param.name.as_str(), param_string(value));
                }
                ParameterLocation::Cookie => {
                    request = request.header(
                        reqwest::header::COOKIE,
                        format!("{}={}", param.name, param_string(value)),
                    );
                }
                ParameterLocation::FormData => form.push((param.name.clone(), param_string(value))),
                ParameterLocation::Body => request = request.json(value),
                ParameterLocation::Path | ParameterLocation::Query => {}
            }
        }
        if !form.is_empty() {
            request = request.form(&form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Other(format!("request to {} failed: {}", op.path, e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read response body: {}", e)))?
            .to_vec();

        let raw = RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(String::from),
            content_type,
            body,
        };

        if !status.is_success() {
            return Err(TransportError::Status(raw));
        }

        // Only responses with a declared shape are decoded here; the request
        // layer unmarshals the rest by content type.
        let declared = op
            .declared_response_shape(status.as_str())
            .or_else(|| op.declared_response_shape("default"))
            .is_some();
        let payload = match raw.content_type.as_deref().map(ContentFamily::from_content_type) {
            Some(ContentFamily::Json) if declared => Some(
                content::unmarshal(raw.content_type.as_deref(), &raw.body).map_err(|e| match e {
                    Error::Decode(msg) => TransportError::Decode(msg),
                    other => TransportError::Other(other.to_string()),
                })?,
            ),
            _ => None,
        };

        Ok(TransportResponse { payload, raw })
    }
}

/// Reject unknown arguments and missing required parameters before any I/O
fn check_arguments(
    op: &OperationDescriptor,
    args: &Arguments,
) -> std::result::Result<(), TransportError> {
    if let Some(unknown) = args.keys().find(|name| op.parameter(name).is_none()) {
        return Err(TransportError::Other(format!(
            "operation '{}' does not have parameter '{}'",
            op.name, unknown
        )));
    }
    if let Some(missing) = op
        .parameters
        .iter()
        .find(|p| p.required && !args.contains_key(&p.name))
    {
        return Err(TransportError::Other(format!(
            "operation '{}' requires parameter '{}'",
            op.name, missing.name
        )));
    }
    Ok(())
}

fn substitute_path_params(
    segment: &str,
    args: &Arguments,
) -> std::result::Result<String, TransportError> {
    let mut out = String::new();
    let mut rest = segment;
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .map(|i| start + i)
            .ok_or_else(|| TransportError::Other(format!("unbalanced path template '{}'", segment)))?;
        let name = &rest[start + 1..end];
        let value = args.get(name).ok_or_else(|| {
            TransportError::Other(format!("missing path parameter '{}'", name))
        })?;
        out.push_str(&rest[..start]);
        out.push_str(&param_string(value));
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Render a parameter value for a URL, header or form field; arrays join with commas
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(param_string).collect::<Vec<_>>().join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Scripted transport for unit tests: replays queued results and records every call
#[cfg(test)]
pub(crate) struct MockTransport {
    responses: std::sync::Mutex<
        std::collections::VecDeque<std::result::Result<TransportResponse, TransportError>>,
    >,
    calls: std::sync::Mutex<Vec<(String, Arguments)>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<std::result::Result<TransportResponse, TransportError>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A success carrying `body` as raw JSON and no decoded payload
    pub fn json(
        status: u16,
        body: Value,
    ) -> std::result::Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            payload: None,
            raw: RawResponse {
                status,
                reason: Some("OK".to_string()),
                content_type: Some(content::APP_JSON.to_string()),
                body: body.to_string().into_bytes(),
            },
        })
    }

    pub fn status(status: u16, text: &str) -> std::result::Result<TransportResponse, TransportError> {
        Err(TransportError::Status(RawResponse {
            status,
            reason: None,
            content_type: Some("text/plain".to_string()),
            body: text.as_bytes().to_vec(),
        }))
    }

    pub fn calls(&self) -> Vec<(String, Arguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        op: &OperationDescriptor,
        args: &Arguments,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push((op.name.clone(), args.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("No more mock responses".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ApiDescription, HttpMethod};
    use serde_json::json;
    use std::sync::Arc;

    fn api() -> Arc<ApiDescription> {
        Arc::new(
            ApiDescription::from_value(json!({
                "swagger": "2.0",
                "paths": {
                    "/ipam/vlans/{id}": {
                        "get": {
                            "operationId": "vlan_read",
                            "parameters": [
                                {"name": "id", "in": "path", "type": "string"},
                                {"name": "tags", "in": "query", "type": "array", "items": {"type": "string"}},
                                {"name": "site", "in": "query", "type": "array",
                                 "items": {"type": "string"}, "collectionFormat": "multi"}
                            ],
                            "responses": {}
                        }
                    }
                }
            }))
            .unwrap(),
        )
    }

    fn transport(base: &str, base_path: Option<&str>) -> HttpTransport {
        let config = ClientConfig::builder().base_url(base).build().unwrap();
        HttpTransport::new(&config, base_path).unwrap()
    }

    #[test]
    fn test_request_url_substitutes_and_encodes() {
        let api = api();
        let op = api.operation_for(HttpMethod::Get, "/ipam/vlans/{id}").unwrap();
        let transport = transport("http://localhost:8080", Some("/api/v1"));

        let mut args = Arguments::new();
        args.insert("id".to_string(), json!("a b/c"));
        args.insert("tags".to_string(), json!(["x", "y"]));
        args.insert("site".to_string(), json!(["hq", "dc"]));

        let url = transport.request_url(op, &args).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/ipam/vlans/a%20b%2Fc?tags=x%2Cy&site=hq&site=dc"
        );
    }

    #[test]
    fn test_check_arguments() {
        let api = api();
        let op = api.operation_for(HttpMethod::Get, "/ipam/vlans/{id}").unwrap();

        let mut args = Arguments::new();
        assert!(check_arguments(op, &args).is_err());

        args.insert("id".to_string(), json!(7));
        assert!(check_arguments(op, &args).is_ok());

        args.insert("bogus".to_string(), json!(1));
        assert!(matches!(
            check_arguments(op, &args),
            Err(TransportError::Other(msg)) if msg.contains("bogus")
        ));
    }

    #[test]
    fn test_param_string() {
        assert_eq!(param_string(&json!("Blue")), "Blue");
        assert_eq!(param_string(&json!(7)), "7");
        assert_eq!(param_string(&json!(true)), "true");
        assert_eq!(param_string(&json!(["a", 1])), "a,1");
    }

    #[test]
    fn test_status_error_display() {
        let err = TransportError::Status(RawResponse {
            status: 404,
            reason: Some("Not Found".to_string()),
            content_type: None,
            body: b"missing".to_vec(),
        });
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
    }
}

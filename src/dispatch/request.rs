//! A callable binding of one operation to one client.

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::outcome::{CallOutcome, FailureDetails, Payload};
use crate::client::Client;
use crate::content;
use crate::error::{Error, Result};
use crate::model::{ModelClass, ModelInstance};
use crate::spec::{HttpMethod, OperationDescriptor};
use crate::transport::{Arguments, TransportError};

/// One operation, ready to call any number of times.
///
/// When the operation has a body parameter the request holds a live body
/// instance, created up front; every call sends its current field values
/// unless the caller passes that parameter explicitly.
#[derive(Debug, Clone)]
pub struct Request {
    client: Client,
    operation: Arc<OperationDescriptor>,
    body_param: Option<String>,
    body: Option<ModelInstance>,
    model_response: bool,
}

impl Request {
    /// Bind `operation` to `client`, building the body class if there is a body parameter.
    pub fn new(client: Client, operation: Arc<OperationDescriptor>) -> Result<Self> {
        let (body_param, body) = match operation.body_parameter() {
            Some(param) => {
                let class = client.registry().body_class(param)?;
                (Some(param.name.clone()), Some(class.instance()))
            }
            None => (None, None),
        };

        Ok(Self {
            model_response: client.model_response(),
            client,
            operation,
            body_param,
            body,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn operation(&self) -> &Arc<OperationDescriptor> {
        &self.operation
    }

    pub fn method(&self) -> HttpMethod {
        self.operation.method
    }

    pub fn path(&self) -> &str {
        &self.operation.path
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.operation.parameters.iter().map(|p| p.name.as_str())
    }

    /// Name of the body parameter, if the operation has one
    pub fn body_parameter(&self) -> Option<&str> {
        self.body_param.as_deref()
    }

    pub fn body_class(&self) -> Option<&ModelClass> {
        self.body.as_ref().map(ModelInstance::class)
    }

    pub fn body(&self) -> Option<&ModelInstance> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut ModelInstance> {
        self.body.as_mut()
    }

    /// Replace the bound body with another instance of the same class.
    pub fn set_body(&mut self, instance: ModelInstance) -> Result<()> {
        let Some(current) = &self.body else {
            return Err(Error::invariant(format!(
                "operation '{}' has no body parameter",
                self.operation.name
            )));
        };
        if instance.class() != current.class() {
            return Err(Error::validation(format!(
                "body of '{}' must be a {}, got {}",
                self.operation.name,
                current.class().name(),
                instance.class().name()
            )));
        }
        self.body = Some(instance);
        Ok(())
    }

    pub fn model_response(&self) -> bool {
        self.model_response
    }

    pub fn set_model_response(&mut self, model_response: bool) {
        self.model_response = model_response;
    }

    /// Execute the operation.
    ///
    /// Error statuses come back as [`CallOutcome::Failure`]; only transport,
    /// decoding and modeling problems are returned as `Err`.
    pub async fn call(&self, mut args: Arguments) -> Result<CallOutcome> {
        if let (Some(name), Some(body)) = (&self.body_param, &self.body) {
            if !args.contains_key(name) {
                args.insert(name.clone(), body.to_value());
            }
        }

        debug!(
            "calling {} {} ({})",
            self.operation.method, self.operation.path, self.operation.name
        );
        let response = match self.client.transport().execute(&self.operation, &args).await {
            Ok(response) => response,
            Err(TransportError::Status(raw)) => {
                warn!(
                    "{} {} failed with HTTP {}",
                    self.operation.method, self.operation.path, raw.status
                );
                return Ok(CallOutcome::Failure(FailureDetails::from(raw)));
            }
            Err(TransportError::Decode(msg)) => return Err(Error::decode(msg)),
            Err(TransportError::Other(msg)) => return Err(Error::transport(msg)),
        };

        let payload = match response.payload {
            Some(payload) => payload,
            None => content::unmarshal(response.raw.content_type.as_deref(), &response.raw.body)?,
        };

        // Only object payloads can populate a model instance
        if self.model_response && payload.is_object() {
            let status = response.raw.status.to_string();
            if let Some(class) = self.client.registry().response_class(&self.operation, &status)? {
                return Ok(CallOutcome::Success(Payload::Model(class.instantiate(payload)?)));
            }
        }

        Ok(CallOutcome::Success(Payload::Raw(payload)))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = json!({
            "method": self.operation.method.as_str(),
            "path": self.operation.path,
            "params": self.parameter_names().collect::<Vec<_>>(),
        });
        let text = serde_json::to_string_pretty(&summary).map_err(|_| fmt::Error)?;
        write!(f, "Request: {}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ApiDescription;
    use crate::transport::{MockTransport, TransportResponse};
    use serde_json::{Value, json};
    use tracing_test::traced_test;

    fn api() -> ApiDescription {
        ApiDescription::from_value(json!({
            "swagger": "2.0",
            "paths": {
                "/vlans": {
                    "get": {
                        "operationId": "vlans_list",
                        "parameters": [{"name": "q", "in": "query", "type": "string"}],
                        "responses": {
                            "200": {"schema": {"$ref": "#/definitions/VlanList"}}
                        }
                    },
                    "post": {
                        "operationId": "vlans_create",
                        "parameters": [{"name": "data", "in": "body", "schema": {
                            "type": "object",
                            "properties": {"vid": {"type": "integer"}, "name": {"type": "string"}}
                        }}],
                        "responses": {"201": {"description": "created"}}
                    }
                }
            },
            "definitions": {
                "VlanList": {
                    "type": "object",
                    "properties": {"count": {"type": "integer"}, "results": {"type": "array",
                        "items": {"type": "object"}}}
                }
            }
        }))
        .unwrap()
    }

    type Scripted = std::result::Result<TransportResponse, TransportError>;

    fn client(responses: Vec<Scripted>) -> (Client, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new(responses));
        let client = Client::with_transport(api(), transport.clone(), false);
        (client, transport)
    }

    #[tokio::test]
    async fn test_body_injected_when_absent() {
        let (client, transport) = client(vec![
            MockTransport::json(201, json!({"id": 1})),
            MockTransport::json(201, json!({"id": 2})),
        ]);
        let mut request = client.request("vlans", "vlans_create").unwrap();
        assert_eq!(request.body_parameter(), Some("data"));
        assert_eq!(request.body_class().unwrap().name(), "VlansCreateBody");

        request.body_mut().unwrap().set("vid", 1001).unwrap();
        let (payload, ok) = request.call(Arguments::new()).await.unwrap().into_parts();
        assert!(ok);
        assert_eq!(payload, json!({"id": 1}));

        let mut explicit = Arguments::new();
        explicit.insert("data".to_string(), json!({"vid": 5}));
        request.call(explicit).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].1.get("data"), Some(&json!({"vid": 1001})));
        assert_eq!(calls[1].1.get("data"), Some(&json!({"vid": 5})));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_status_error_is_soft_failure() {
        let (client, _) = client(vec![MockTransport::status(404, "no such vlan")]);
        let request = client.request("vlans", "vlans_list").unwrap();

        let outcome = request.call(Arguments::new()).await.unwrap();
        assert!(!outcome.is_ok());
        let details = outcome.failure().unwrap();
        assert_eq!(details.status, 404);
        assert_eq!(details.text, "no such vlan");
        assert!(logs_contain("get /vlans failed with HTTP 404"));
    }

    #[tokio::test]
    async fn test_other_transport_error_is_fatal() {
        let (client, _) = client(vec![]);
        let request = client.request("vlans", "vlans_list").unwrap();
        assert!(matches!(
            request.call(Arguments::new()).await,
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_model_response() {
        let (client, _) = client(vec![
            MockTransport::json(200, json!({"count": 1, "results": [{"id": 7}]})),
            MockTransport::json(200, json!({"count": 1, "results": []})),
        ]);
        let mut request = client.request("vlans", "vlans_list").unwrap();
        request.set_model_response(true);

        let outcome = request.call(Arguments::new()).await.unwrap();
        let model = outcome.payload().and_then(Payload::as_model).unwrap();
        assert_eq!(model.class().name(), "VlanList");
        assert_eq!(model.get("count"), Some(&json!(1)));

        request.set_model_response(false);
        let outcome = request.call(Arguments::new()).await.unwrap();
        assert!(matches!(outcome.payload(), Some(Payload::Raw(Value::Object(_)))));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let (client, _) = client(vec![Err(TransportError::Decode(
            "invalid JSON response body".to_string(),
        ))]);
        let request = client.request("vlans", "vlans_list").unwrap();
        assert!(matches!(
            request.call(Arguments::new()).await,
            Err(Error::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_model_response_follows_client_policy() {
        let (client, _) = client(vec![]);
        client.set_model_response(true);
        assert!(client.request("vlans", "vlans_list").unwrap().model_response());
    }

    #[test]
    fn test_set_body_checks_class() {
        let (client, _) = client(vec![]);
        let mut create = client.request("vlans", "vlans_create").unwrap();
        let mut list = client.request("vlans", "vlans_list").unwrap();

        let replacement = create.body_class().unwrap().instance();
        create.set_body(replacement.clone()).unwrap();
        assert!(matches!(list.set_body(replacement), Err(Error::Invariant(_))));

        let other = client.registry().model_class("VlanList").unwrap().instance();
        assert!(matches!(create.set_body(other), Err(Error::Validation(_))));
    }

    #[test]
    fn test_display() {
        let (client, _) = client(vec![]);
        let request = client.request("vlans", "vlans_list").unwrap();
        let text = request.to_string();
        assert!(text.starts_with("Request: {"));
        assert!(text.contains("\"path\": \"/vlans\""));
        assert!(text.contains("\"q\""));
    }
}

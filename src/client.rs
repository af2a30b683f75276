//! The owning client: API description, model registry, transport and response policy.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use url::Url;

use crate::dispatch::{OperationDispatcher, Request, ResourceHandle};
use crate::error::{Error, Result};
use crate::model::ModelRegistry;
use crate::spec::{ApiDescription, HttpMethod};
use crate::transport::{HttpTransport, Transport};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration (built with [`ClientConfig::builder`])
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    model_response: bool,
    timeout: Duration,
    user_agent: String,
    default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether responses are returned as model instances by default
    pub fn model_response(&self) -> bool {
        self.model_response
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Headers sent with every call, e.g. an `Authorization` token
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    model_response: bool,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Vec<(String, String)>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model_response(mut self, model_response: bool) -> Self {
        self.model_response = model_response;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::validation("base URL is required"))?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| Error::validation(format!("invalid base URL '{}': {}", base_url, e)))?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::validation("timeout must be greater than zero"));
        }

        Ok(ClientConfig {
            base_url,
            model_response: self.model_response,
            timeout,
            user_agent: self.user_agent.unwrap_or_else(|| {
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
            }),
            default_headers: self.default_headers,
        })
    }
}

struct ClientInner {
    api: Arc<ApiDescription>,
    registry: ModelRegistry,
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    model_response: AtomicBool,
}

/// Binds one API description to one transport.
///
/// Cloning is cheap; clones share the description, the model cache and the
/// response policy.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// A client calling the API over HTTP at `config.base_url()`
    pub fn new(api: ApiDescription, config: &ClientConfig) -> Result<Self> {
        let base_path = api
            .document()
            .get("basePath")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let transport = HttpTransport::new(config, base_path.as_deref())?;
        Ok(Self::from_parts(
            api,
            Arc::new(transport),
            config.model_response(),
            Some(config.base_url().clone()),
        ))
    }

    /// A client calling the API through any transport
    pub fn with_transport(
        api: ApiDescription,
        transport: Arc<dyn Transport>,
        model_response: bool,
    ) -> Self {
        Self::from_parts(api, transport, model_response, None)
    }

    fn from_parts(
        api: ApiDescription,
        transport: Arc<dyn Transport>,
        model_response: bool,
        base_url: Option<Url>,
    ) -> Self {
        let api = Arc::new(api);
        Self {
            inner: Arc::new(ClientInner {
                registry: ModelRegistry::new(Arc::clone(&api)),
                api,
                transport,
                base_url,
                model_response: AtomicBool::new(model_response),
            }),
        }
    }

    pub fn api(&self) -> &Arc<ApiDescription> {
        &self.inner.api
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Client-wide default for returning modeled responses; requests read it when created
    pub fn model_response(&self) -> bool {
        self.inner.model_response.load(Ordering::Relaxed)
    }

    pub fn set_model_response(&self, model_response: bool) {
        self.inner
            .model_response
            .store(model_response, Ordering::Relaxed);
    }

    pub fn dispatcher(&self) -> OperationDispatcher {
        OperationDispatcher::new(self.clone())
    }

    /// Shorthand for `dispatcher().request(resource, operation)`
    pub fn request(&self, resource: &str, operation: &str) -> Result<Request> {
        self.dispatcher().request(resource, operation)
    }

    /// Shorthand for `dispatcher().command_request(method, path)`
    pub fn command_request(&self, method: HttpMethod, path: &str) -> Result<Request> {
        self.dispatcher().command_request(method, path)
    }

    /// Shorthand for `dispatcher().path_requests(path)`
    pub fn path_requests(&self, path: &str) -> Result<ResourceHandle> {
        self.dispatcher().path_requests(path)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("title", &self.inner.api.title())
            .field("model_response", &self.model_response())
            .finish()
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = serde_json::json!({
            "client-url": self.inner.base_url.as_ref().map(Url::as_str),
        });
        write!(f, "{}", summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api() -> ApiDescription {
        ApiDescription::from_value(json!({
            "swagger": "2.0",
            "basePath": "/api",
            "paths": {"/hcl": {"get": {"operationId": "hcl_list", "responses": {}}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ClientConfig::builder()
            .base_url("http://localhost:32768")
            .header("Authorization", "Token 0123")
            .build()
            .unwrap();

        assert_eq!(config.base_url().as_str(), "http://localhost:32768/");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert!(!config.model_response());
        assert!(config.user_agent().starts_with("apibind/"));
        assert_eq!(
            config.default_headers(),
            &[("Authorization".to_string(), "Token 0123".to_string())]
        );
    }

    #[test]
    fn test_config_builder_validation() {
        assert!(matches!(
            ClientConfig::builder().build(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ClientConfig::builder().base_url("not a url").build(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ClientConfig::builder()
                .base_url("http://localhost")
                .timeout(Duration::ZERO)
                .build(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_client_new_and_display() {
        let config = ClientConfig::builder()
            .base_url("http://localhost:32768")
            .model_response(true)
            .build()
            .unwrap();
        let client = Client::new(api(), &config).unwrap();

        assert!(client.model_response());
        client.set_model_response(false);
        assert!(!client.clone().model_response());
        assert_eq!(
            client.to_string(),
            r#"{"client-url":"http://localhost:32768/"}"#
        );
        assert!(client.request("hcl", "hcl_list").is_ok());
    }
}

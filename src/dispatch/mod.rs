//! Operation dispatch.
//!
//! Every operation of an API description is reachable three ways, all of
//! which end in [`Request::new`]:
//!
//! 1. resource name, then operation name ([`OperationDispatcher::request`]);
//! 2. exact method and path ([`OperationDispatcher::command_request`]);
//! 3. path, then method ([`OperationDispatcher::path_requests`]).

pub mod outcome;
pub mod request;

pub use outcome::{CallOutcome, FailureDetails, Payload};
pub use request::Request;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::spec::{HttpMethod, OperationDescriptor};

/// Entry point for building requests from a client's operation graph
#[derive(Debug, Clone)]
pub struct OperationDispatcher {
    client: Client,
}

impl OperationDispatcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Names of all resources, in document order
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.client.api().resource_names()
    }

    /// The operations grouped under one resource
    pub fn resource(&self, name: &str) -> Result<ResourceHandle> {
        let operations = self
            .client
            .api()
            .resource(name)
            .ok_or_else(|| Error::lookup(format!("no resource named '{}'", name)))?;

        Ok(ResourceHandle {
            client: self.client.clone(),
            name: name.to_string(),
            operations: operations.clone(),
        })
    }

    /// Request for `operation` within `resource`
    pub fn request(&self, resource: &str, operation: &str) -> Result<Request> {
        self.resource(resource)?.request(operation)
    }

    /// Request for the operation declared at exactly (`method`, `path`)
    pub fn command_request(&self, method: HttpMethod, path: &str) -> Result<Request> {
        let operation = self
            .client
            .api()
            .operation_for(method, path)
            .ok_or_else(|| {
                Error::lookup(format!("no command found for ({}, {})", method, path))
            })?;
        Request::new(self.client.clone(), Arc::clone(operation))
    }

    /// One request per HTTP method declared for `path`, keyed by lower-case method name
    pub fn path_requests(&self, path: &str) -> Result<ResourceHandle> {
        let methods = self
            .client
            .api()
            .path(path)
            .ok_or_else(|| Error::lookup(format!("no path found for '{}'", path)))?;

        Ok(ResourceHandle {
            client: self.client.clone(),
            name: path.to_string(),
            operations: methods
                .iter()
                .map(|(method, op)| (method.as_str().to_string(), Arc::clone(op)))
                .collect(),
        })
    }
}

/// A named group of operations: a resource, or the methods of one path
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    client: Client,
    name: String,
    operations: IndexMap<String, Arc<OperationDescriptor>>,
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn request(&self, operation: &str) -> Result<Request> {
        let op = self.operations.get(operation).ok_or_else(|| {
            Error::lookup(format!(
                "'{}' has no operation named '{}'",
                self.name, operation
            ))
        })?;
        Request::new(self.client.clone(), Arc::clone(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ApiDescription;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn dispatcher() -> OperationDispatcher {
        let api = ApiDescription::from_value(json!({
            "swagger": "2.0",
            "paths": {
                "/ipam/vlans": {
                    "get": {"operationId": "ipam_vlans_list", "tags": ["ipam"], "responses": {}},
                    "post": {
                        "operationId": "ipam_vlans_create",
                        "tags": ["ipam"],
                        "parameters": [{"name": "data", "in": "body", "schema": {"$ref": "#/definitions/Vlan"}}],
                        "responses": {}
                    }
                },
                "/status": {"get": {"responses": {}}}
            },
            "definitions": {
                "Vlan": {"type": "object", "properties": {"vid": {"type": "integer"}}}
            }
        }))
        .unwrap();
        let client = Client::with_transport(api, Arc::new(MockTransport::new(vec![])), false);
        client.dispatcher()
    }

    #[test]
    fn test_resource_introspection() {
        let dispatcher = dispatcher();
        let resources: Vec<_> = dispatcher.resources().collect();
        assert_eq!(resources, vec!["ipam", "status"]);

        let ipam = dispatcher.resource("ipam").unwrap();
        let ops: Vec<_> = ipam.operations().collect();
        assert_eq!(ops, vec!["ipam_vlans_list", "ipam_vlans_create"]);
        assert!(ipam.contains("ipam_vlans_list"));
        assert_eq!(ipam.len(), 2);

        assert!(matches!(dispatcher.resource("dcim"), Err(Error::Lookup(_))));
        assert!(matches!(ipam.request("nope"), Err(Error::Lookup(_))));
    }

    #[test]
    fn test_addressing_modes_agree() {
        let dispatcher = dispatcher();
        let by_name = dispatcher.request("ipam", "ipam_vlans_create").unwrap();
        let by_command = dispatcher
            .command_request(HttpMethod::Post, "/ipam/vlans")
            .unwrap();
        let by_path = dispatcher
            .path_requests("/ipam/vlans")
            .unwrap()
            .request("post")
            .unwrap();

        assert!(Arc::ptr_eq(by_name.operation(), by_command.operation()));
        assert!(Arc::ptr_eq(by_name.operation(), by_path.operation()));
        // body classes come from the shared registry cache
        assert_eq!(by_name.body_class(), by_command.body_class());
        assert_eq!(by_name.body_class().unwrap().name(), "Vlan");
    }

    #[test]
    fn test_command_request_unknown_is_lookup_error() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .command_request(HttpMethod::Get, "/unknown")
            .unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
        assert!(err.to_string().contains("no command found for (get, /unknown)"));

        assert!(matches!(
            dispatcher.command_request(HttpMethod::Delete, "/status"),
            Err(Error::Lookup(_))
        ));
    }

    #[test]
    fn test_path_requests() {
        let dispatcher = dispatcher();
        let handle = dispatcher.path_requests("/ipam/vlans").unwrap();
        let methods: Vec<_> = handle.operations().collect();
        assert_eq!(methods, vec!["get", "post"]);
        assert_eq!(handle.name(), "/ipam/vlans");

        assert!(matches!(
            dispatcher.path_requests("/dcim/sites"),
            Err(Error::Lookup(_))
        ));
    }
}

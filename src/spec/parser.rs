//! Builds the operation graph out of a raw Swagger 2.0 / OpenAPI 3 document.
//!
//! Handles:
//! - path-level and operation-level parameters (with `$ref` parameters)
//! - Swagger 2.0 `in: body` parameters and OpenAPI 3 `requestBody`
//! - response shapes per status code, in either document flavour
//!
//! Shapes are copied verbatim; `$ref`s inside them are left for
//! [`ApiDescription::deref`](super::ApiDescription::deref).

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::tagging::sanitize_identifier;
use super::types::{
    HttpMethod, OperationDescriptor, ParameterDescriptor, ParameterLocation, ResponseDescriptor,
};
use crate::error::{Error, Result};

/// Name given to the body parameter synthesized from an OpenAPI 3 `requestBody`
pub const REQUEST_BODY_PARAM: &str = "body";

/// Resource name for operations that have neither tags nor a path segment
const DEFAULT_RESOURCE: &str = "default";

// Non-body parameter fields that together describe the parameter's value schema
const VALUE_SCHEMA_FIELDS: &[&str] = &[
    "type",
    "format",
    "items",
    "enum",
    "default",
    "minimum",
    "maximum",
    "pattern",
    "collectionFormat",
];

pub(crate) struct DocumentParser<'a> {
    document: &'a Value,
}

impl<'a> DocumentParser<'a> {
    pub(crate) fn new(document: &'a Value) -> Self {
        Self { document }
    }

    /// Parse every operation declared under `paths`
    pub(crate) fn parse_operations(&self) -> Result<Vec<OperationDescriptor>> {
        let paths = self
            .document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::shape("missing 'paths' object"))?;

        paths
            .iter()
            .flat_map(|(path, path_item)| {
                HttpMethod::all().iter().filter_map(move |method| {
                    path_item
                        .get(method.as_str())
                        .and_then(Value::as_object)
                        .map(|method_item| (path, *method, path_item, method_item))
                })
            })
            .map(|(path, method, path_item, method_item)| {
                self.build_operation(path, method, path_item, method_item)
            })
            .collect()
    }

    fn build_operation(
        &self,
        path: &str,
        method: HttpMethod,
        path_item: &Value,
        method_item: &Map<String, Value>,
    ) -> Result<OperationDescriptor> {
        let operation_id = method_item
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from);

        let name = match operation_id.as_deref() {
            Some(id) => sanitize_identifier(id),
            None => sanitize_identifier(&format!("{}_{}", method, path)),
        };

        // Operation-level parameters override path-level ones with the same name and location
        let mut parameters = self.extract_parameters(path_item.get("parameters"))?;
        for param in self.extract_parameters(method_item.get("parameters"))? {
            match parameters
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }

        if let Some(body) = method_item.get("requestBody") {
            parameters.push(self.parse_request_body(body)?);
        }

        let tags = method_item
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(OperationDescriptor {
            name,
            operation_id,
            method,
            path: path.to_string(),
            tags,
            summary: method_item
                .get("summary")
                .and_then(Value::as_str)
                .map(String::from),
            parameters,
            responses: self.extract_responses(method_item)?,
        })
    }

    fn extract_parameters(&self, params: Option<&Value>) -> Result<Vec<ParameterDescriptor>> {
        let Some(arr) = params.and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        arr.iter()
            .map(|param| {
                let resolved = self.resolve_local(param)?;
                self.parse_parameter(resolved)
            })
            .collect()
    }

    fn parse_parameter(&self, param: &Value) -> Result<ParameterDescriptor> {
        let name = param
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::shape("parameter missing name"))?
            .to_string();

        let location: ParameterLocation = param
            .get("in")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::shape(format!("parameter '{}' missing location", name)))?
            .parse()?;

        let schema = match param.get("schema") {
            Some(schema) => Some(schema.clone()),
            None => {
                let value_schema: Map<String, Value> = VALUE_SCHEMA_FIELDS
                    .iter()
                    .filter_map(|field| param.get(*field).map(|v| (field.to_string(), v.clone())))
                    .collect();
                (!value_schema.is_empty()).then_some(Value::Object(value_schema))
            }
        };

        Ok(ParameterDescriptor {
            required: param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(location == ParameterLocation::Path),
            name,
            location,
            schema,
            description: param
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    fn parse_request_body(&self, body: &Value) -> Result<ParameterDescriptor> {
        let resolved = self.resolve_local(body)?;

        Ok(ParameterDescriptor {
            name: REQUEST_BODY_PARAM.to_string(),
            location: ParameterLocation::Body,
            required: resolved
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            schema: json_media_schema(resolved).cloned(),
            description: resolved
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    fn extract_responses(
        &self,
        method_item: &Map<String, Value>,
    ) -> Result<IndexMap<String, ResponseDescriptor>> {
        let Some(map) = method_item.get("responses").and_then(Value::as_object) else {
            return Ok(IndexMap::new());
        };

        map.iter()
            .map(|(status_code, response)| {
                let resolved = self.resolve_local(response)?;
                let schema = resolved
                    .get("schema")
                    .or_else(|| json_media_schema(resolved))
                    .cloned();
                Ok((
                    status_code.clone(),
                    ResponseDescriptor {
                        status_code: status_code.clone(),
                        description: resolved
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                        schema,
                    },
                ))
            })
            .collect()
    }

    /// Follow a `$ref` on a parameter/response/request-body object, if present
    fn resolve_local<'v>(&self, value: &'v Value) -> Result<&'v Value>
    where
        'a: 'v,
    {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => resolve_pointer(self.document, reference),
            None => Ok(value),
        }
    }
}

/// Resolve a local `#/...` reference against a document
pub(crate) fn resolve_pointer<'d>(document: &'d Value, reference: &str) -> Result<&'d Value> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| Error::lookup(format!("unsupported non-local reference '{}'", reference)))?;

    document
        .pointer(pointer)
        .ok_or_else(|| Error::lookup(format!("unresolved reference '{}'", reference)))
}

/// Group an operation under its tags, or its first path segment when untagged
pub(crate) fn resource_names(op: &OperationDescriptor) -> Vec<String> {
    if !op.tags.is_empty() {
        return op.tags.clone();
    }

    let segment = op
        .path
        .trim_start_matches('/')
        .split('/')
        .next()
        .map(sanitize_identifier)
        .unwrap_or_default();

    if segment.is_empty() {
        vec![DEFAULT_RESOURCE.to_string()]
    } else {
        vec![segment]
    }
}

fn json_media_schema(holder: &Value) -> Option<&Value> {
    holder
        .get("content")
        .and_then(Value::as_object)?
        .iter()
        .find(|(media, _)| media.contains("json"))
        .and_then(|(_, media)| media.get("schema"))
}

//! Memoizing registry of model classes.
//!
//! One registry belongs to one client. For a fixed registry and a fixed name
//! exactly one [`ModelClass`] is ever produced; the cache has no eviction.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use super::class::ModelClass;
use crate::error::{Error, Result};
use crate::spec::{ApiDescription, OperationDescriptor, ParameterDescriptor, ShapeDefinition};

/// Shape fields consulted, in priority order, for a shape's model name
const MODEL_NAME_KEYS: &[&str] = &["x-model", "title", "id"];

/// Builds and caches model classes for the shapes of one API description
#[derive(Debug)]
pub struct ModelRegistry {
    api: Arc<ApiDescription>,
    cache: Mutex<HashMap<String, ModelClass>>,
}

impl ModelRegistry {
    pub fn new(api: Arc<ApiDescription>) -> Self {
        Self {
            api,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Model name of a shape: its `x-model` tag, else `title`, else `id`
    pub fn resolve_name(shape: &ShapeDefinition) -> Option<String> {
        MODEL_NAME_KEYS
            .iter()
            .filter_map(|key| shape.get(*key).and_then(Value::as_str))
            .find(|name| !name.is_empty())
            .map(String::from)
    }

    /// The class for a named definition, built on first use.
    ///
    /// A failed build leaves no cache entry behind.
    pub fn model_class(&self, name: &str) -> Result<ModelClass> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::invariant("model cache lock poisoned"))?;

        if let Some(class) = cache.get(name) {
            debug!("model cache hit for '{}'", name);
            return Ok(class.clone());
        }

        let shape = self
            .api
            .definitions()
            .get(name)
            .ok_or_else(|| Error::lookup(format!("no shape definition named '{}'", name)))?;

        debug!("building model class '{}'", name);
        let class = ModelClass::build(name, &shape, &self.api)?;
        cache.insert(name.to_string(), class.clone());
        Ok(class)
    }

    /// The class for a body parameter's shape, named or inline.
    pub fn body_class(&self, param: &ParameterDescriptor) -> Result<ModelClass> {
        let schema = param.schema.as_ref().ok_or_else(|| {
            Error::invariant(format!("body parameter '{}' declares no shape", param.name))
        })?;
        self.class_for_shape(schema)
    }

    /// The class for the response shape declared at `status_code`, if there is one.
    pub fn response_class(
        &self,
        op: &OperationDescriptor,
        status_code: &str,
    ) -> Result<Option<ModelClass>> {
        op.declared_response_shape(status_code)
            .map(|schema| self.class_for_shape(schema))
            .transpose()
    }

    /// Names currently held by the cache
    pub fn cached_names(&self) -> Vec<String> {
        self.cache
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    // Unnamed shapes are keyed by a hash of their content, so equal shapes
    // share one class no matter where the descriptor lives.
    fn class_for_shape(&self, schema: &ShapeDefinition) -> Result<ModelClass> {
        let shape = self.api.deref(schema)?;
        let cache_name = Self::resolve_name(shape).unwrap_or_else(|| anonymous_name(shape));

        if self.api.definitions().register(&cache_name, shape.clone())? {
            debug!("registered inline shape as '{}'", cache_name);
        }
        self.model_class(&cache_name)
    }
}

fn anonymous_name(shape: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    shape.to_string().hash(&mut hasher);
    format!("anonymous@{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::HttpMethod;
    use serde_json::json;

    fn api() -> Arc<ApiDescription> {
        Arc::new(
            ApiDescription::from_value(json!({
                "swagger": "2.0",
                "paths": {
                    "/vlans": {
                        "post": {
                            "operationId": "vlans_create",
                            "parameters": [{"name": "data", "in": "body", "schema": {
                                "type": "object", "properties": {"vid": {"type": "integer"}}
                            }}],
                            "responses": {
                                "201": {"schema": {"$ref": "#/definitions/Vlan"}},
                                "204": {"description": "nothing"}
                            }
                        },
                        "put": {
                            "parameters": [{"name": "data", "in": "body", "schema": {"$ref": "#/definitions/Vlan"}}],
                            "responses": {}
                        }
                    }
                },
                "definitions": {
                    "Vlan": {"type": "object", "properties": {"name": {"type": "string"}}},
                    "Titled": {"title": "Pretty", "type": "object"},
                    "Broken": {"type": "object", "properties": {"f": {"type": "file"}}}
                }
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_resolve_name_priority() {
        assert_eq!(
            ModelRegistry::resolve_name(&json!({"x-model": "A", "title": "B", "id": "C"})),
            Some("A".to_string())
        );
        assert_eq!(
            ModelRegistry::resolve_name(&json!({"title": "B", "id": "C"})),
            Some("B".to_string())
        );
        assert_eq!(
            ModelRegistry::resolve_name(&json!({"id": "C"})),
            Some("C".to_string())
        );
        assert_eq!(ModelRegistry::resolve_name(&json!({"type": "object"})), None);
    }

    #[test]
    fn test_model_class_memoized_identity() {
        let registry = ModelRegistry::new(api());
        let first = registry.model_class("Vlan").unwrap();
        let second = registry.model_class("Vlan").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.cached_names(), vec!["Vlan".to_string()]);
    }

    #[test]
    fn test_unknown_name_is_lookup_error() {
        let registry = ModelRegistry::new(api());
        assert!(matches!(
            registry.model_class("Nope"),
            Err(Error::Lookup(_))
        ));
    }

    #[test]
    fn test_failed_build_not_cached() {
        let registry = ModelRegistry::new(api());
        assert!(matches!(registry.model_class("Broken"), Err(Error::Shape(_))));
        assert!(registry.cached_names().is_empty());
        assert!(matches!(registry.model_class("Broken"), Err(Error::Shape(_))));
    }

    #[test]
    fn test_body_class_inline_and_ref() {
        let api = api();
        let registry = ModelRegistry::new(Arc::clone(&api));

        let create = api.operation_for(HttpMethod::Post, "/vlans").unwrap();
        let inline = registry.body_class(create.body_parameter().unwrap()).unwrap();
        assert_eq!(inline.name(), "VlansCreateBody");
        assert!(api.definitions().contains("VlansCreateBody"));
        assert_eq!(
            inline,
            registry.body_class(create.body_parameter().unwrap()).unwrap()
        );

        let put = api.operation_for(HttpMethod::Put, "/vlans").unwrap();
        let by_ref = registry.body_class(put.body_parameter().unwrap()).unwrap();
        assert_eq!(by_ref, registry.model_class("Vlan").unwrap());
    }

    #[test]
    fn test_body_class_untagged_shape_uses_content_key() {
        let registry = ModelRegistry::new(api());
        let param = ParameterDescriptor {
            name: "data".to_string(),
            location: crate::spec::ParameterLocation::Body,
            required: true,
            schema: Some(json!({"type": "object", "properties": {"a": {"type": "string"}}})),
            description: None,
        };

        let class = registry.body_class(&param).unwrap();
        assert!(class.name().starts_with("anonymous@"));
        assert_eq!(class, registry.body_class(&param).unwrap());

        // a fresh descriptor with the same shape maps to the same class
        let copy = param.clone();
        drop(param);
        assert_eq!(class, registry.body_class(&copy).unwrap());

        let other = ParameterDescriptor {
            schema: Some(json!({"type": "object", "properties": {"b": {"type": "integer"}}})),
            ..copy
        };
        let other_class = registry.body_class(&other).unwrap();
        assert_ne!(class.name(), other_class.name());
        assert!(other_class.property_type("b").is_some());
    }

    #[test]
    fn test_body_without_shape_is_invariant_violation() {
        let registry = ModelRegistry::new(api());
        let param = ParameterDescriptor {
            name: "data".to_string(),
            location: crate::spec::ParameterLocation::Body,
            required: true,
            schema: None,
            description: None,
        };
        assert!(matches!(
            registry.body_class(&param),
            Err(Error::Invariant(_))
        ));
    }

    #[test]
    fn test_response_class() {
        let api = api();
        let registry = ModelRegistry::new(Arc::clone(&api));
        let create = api.operation_for(HttpMethod::Post, "/vlans").unwrap();

        let class = registry.response_class(create, "201").unwrap().unwrap();
        assert_eq!(class, registry.model_class("Vlan").unwrap());
        assert!(registry.response_class(create, "204").unwrap().is_none());
        assert!(registry.response_class(create, "500").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_model_class_single_build() {
        let registry = Arc::new(ModelRegistry::new(api()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.model_class("Vlan").unwrap())
            })
            .collect();

        let classes: Vec<ModelClass> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(classes.windows(2).all(|pair| pair[0] == pair[1]));
    }
}

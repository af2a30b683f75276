//! In-memory API description: definitions table, dereferencing, operation graph and path table.
//!
//! An [`ApiDescription`] is built once from an already-parsed document and is
//! read-only afterwards, apart from the [`DefinitionTable`], which accepts
//! registrations of inline shapes under synthetic names.

pub mod parser;
pub mod tagging;
pub mod types;

use std::path::Path;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use parser::{DocumentParser, resolve_pointer};
pub use types::{
    HttpMethod, OperationDescriptor, ParameterDescriptor, ParameterLocation, ResponseDescriptor,
    ShapeDefinition,
};

// Longest `$ref` chain followed before the chain is declared cyclic
const MAX_REF_HOPS: usize = 64;

/// Operations of one resource, keyed by operation name
pub type OperationTable = IndexMap<String, Arc<OperationDescriptor>>;

/// Operations of one path, keyed by HTTP method
pub type MethodTable = IndexMap<HttpMethod, Arc<OperationDescriptor>>;

/// Named shape definitions, shared between the description and the model registry
#[derive(Debug, Default)]
pub struct DefinitionTable {
    shapes: RwLock<IndexMap<String, ShapeDefinition>>,
}

impl DefinitionTable {
    pub fn new(shapes: IndexMap<String, ShapeDefinition>) -> Self {
        Self {
            shapes: RwLock::new(shapes),
        }
    }

    pub fn get(&self, name: &str) -> Option<ShapeDefinition> {
        self.shapes.read().ok()?.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shapes
            .read()
            .map(|guard| guard.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        self.shapes
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Register a shape under `name` unless that name is already taken.
    ///
    /// Returns `true` when the shape was inserted.
    pub fn register(&self, name: &str, shape: ShapeDefinition) -> Result<bool> {
        let mut guard = self
            .shapes
            .write()
            .map_err(|_| Error::invariant("definition table lock poisoned"))?;
        if guard.contains_key(name) {
            return Ok(false);
        }
        guard.insert(name.to_string(), shape);
        Ok(true)
    }
}

/// A reference-resolvable API description with its operation graph
#[derive(Debug)]
pub struct ApiDescription {
    document: Value,
    definitions: DefinitionTable,
    resources: IndexMap<String, OperationTable>,
    paths: IndexMap<String, MethodTable>,
}

impl ApiDescription {
    /// Build a description from an already-parsed Swagger 2.0 or OpenAPI 3 document.
    ///
    /// Named definitions and inline body shapes are tagged with `x-model`
    /// before the operation graph is built.
    pub fn from_value(mut document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(Error::shape("API description must be a JSON object"));
        }

        for pointer in ["/definitions", "/components/schemas"] {
            if let Some(defs) = document.pointer_mut(pointer).and_then(Value::as_object_mut) {
                tagging::tag_definitions(defs);
            }
        }
        tagging::modeltag_nonref_schemas(&mut document);

        let definitions: IndexMap<String, ShapeDefinition> = document
            .pointer("/definitions")
            .or_else(|| document.pointer("/components/schemas"))
            .and_then(Value::as_object)
            .map(|defs| defs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let operations = DocumentParser::new(&document).parse_operations()?;
        debug!(
            "API description has {} operations and {} definitions",
            operations.len(),
            definitions.len()
        );

        let mut resources: IndexMap<String, OperationTable> = IndexMap::new();
        let mut paths: IndexMap<String, MethodTable> = IndexMap::new();
        for op in operations {
            let op = Arc::new(op);
            for resource in parser::resource_names(&op) {
                resources
                    .entry(resource)
                    .or_default()
                    .insert(op.name.clone(), Arc::clone(&op));
            }
            paths
                .entry(op.path.clone())
                .or_default()
                .insert(op.method, op);
        }

        Ok(Self {
            document,
            definitions: DefinitionTable::new(definitions),
            resources,
            paths,
        })
    }

    /// Read a JSON or YAML document from disk and build a description from it.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let document: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            // Try JSON first, then YAML
            _ => match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(_) => serde_yaml::from_str(&content)?,
            },
        };

        Self::from_value(document)
    }

    /// The tagged document the description was built from
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn title(&self) -> Option<&str> {
        self.document.pointer("/info/title")?.as_str()
    }

    pub fn version(&self) -> Option<&str> {
        self.document.pointer("/info/version")?.as_str()
    }

    pub fn definitions(&self) -> &DefinitionTable {
        &self.definitions
    }

    /// Resolve `$ref` indirection until a concrete shape is reached.
    pub fn deref<'a>(&'a self, shape: &'a Value) -> Result<&'a Value> {
        let mut current = shape;
        for _ in 0..MAX_REF_HOPS {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => current = resolve_pointer(&self.document, reference)?,
                None => return Ok(current),
            }
        }
        Err(Error::shape(format!(
            "reference chain starting at {} does not terminate",
            shape
        )))
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn resource(&self, name: &str) -> Option<&OperationTable> {
        self.resources.get(name)
    }

    pub fn path_names(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn path(&self, path: &str) -> Option<&MethodTable> {
        self.paths.get(path)
    }

    /// The operation declared for an exact (method, path) pair
    pub fn operation_for(&self, method: HttpMethod, path: &str) -> Option<&Arc<OperationDescriptor>> {
        self.paths.get(path)?.get(&method)
    }

    /// All operations, in document order
    pub fn operations(&self) -> impl Iterator<Item = &Arc<OperationDescriptor>> {
        self.paths.values().flat_map(|methods| methods.values())
    }
}

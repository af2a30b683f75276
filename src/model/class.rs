//! Generated data-model classes and their instances.
//!
//! A [`ModelClass`] is built from one shape definition and checks property
//! assignments against the declared property types. Classes compare by
//! identity: two handles are equal only when they came from the same build.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::spec::{ApiDescription, ShapeDefinition};

/// Declared type of one model property
#[derive(Debug, Clone)]
pub enum PropertyType {
    Integer,
    Number,
    String,
    Boolean,
    Null,
    /// An object; carries a nested class when the shape declares properties.
    ///
    /// Nested classes are built with their parent and are never the
    /// registry's cached class for the same shape, so compare them by name.
    Object(Option<ModelClass>),
    Array(Box<PropertyType>),
    /// No type constraint
    Any,
}

impl PropertyType {
    /// Element type of an array property
    pub fn item_type(&self) -> Option<&PropertyType> {
        match self {
            PropertyType::Array(item) => Some(item),
            _ => None,
        }
    }

    /// JSON-schema name of the type
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::String => "string",
            PropertyType::Boolean => "boolean",
            PropertyType::Null => "null",
            PropertyType::Object(_) => "object",
            PropertyType::Array(_) => "array",
            PropertyType::Any => "any",
        }
    }

    fn check(&self, path: &str, value: &Value) -> Result<()> {
        let type_matches = match (self, value) {
            (PropertyType::Any, _) => true,
            (PropertyType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            // "number" accepts both integer and number
            (PropertyType::Number, Value::Number(_)) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (PropertyType::Null, Value::Null) => true,
            (PropertyType::Object(nested), Value::Object(map)) => {
                if let Some(class) = nested {
                    class.check_properties(path, map)?;
                }
                true
            }
            (PropertyType::Array(item), Value::Array(elements)) => {
                for (i, element) in elements.iter().enumerate() {
                    item.check(&format!("{}[{}]", path, i), element)?;
                }
                true
            }
            _ => false,
        };

        if type_matches {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "property '{}' should be {}, got {}",
                path,
                self.type_name(),
                json_value_type(value)
            )))
        }
    }
}

/// JSON-schema type name for a JSON value
fn json_value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug)]
struct ClassDef {
    name: String,
    shape: ShapeDefinition,
    properties: IndexMap<String, PropertyType>,
    required: Vec<String>,
    additional_properties: bool,
}

/// A data-model class generated from a named shape definition
#[derive(Debug, Clone)]
pub struct ModelClass {
    def: Arc<ClassDef>,
}

impl PartialEq for ModelClass {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
    }
}

impl Eq for ModelClass {}

impl ModelClass {
    /// Build a class for `shape`, resolving nested `$ref`s through `api`.
    pub fn build(name: &str, shape: &ShapeDefinition, api: &ApiDescription) -> Result<Self> {
        ClassBuilder {
            api,
            building: Vec::new(),
        }
        .build_class(name, shape)
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The resolved shape this class was built from
    pub fn shape(&self) -> &ShapeDefinition {
        &self.def.shape
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.def.properties.keys().map(String::as_str)
    }

    pub fn property_type(&self, name: &str) -> Option<&PropertyType> {
        self.def.properties.get(name)
    }

    pub fn required(&self) -> &[String] {
        &self.def.required
    }

    /// A new, empty instance
    pub fn instance(&self) -> ModelInstance {
        ModelInstance {
            class: self.clone(),
            values: Map::new(),
        }
    }

    /// Construct an instance from a structured value, checking every property.
    pub fn instantiate(&self, value: Value) -> Result<ModelInstance> {
        let Value::Object(map) = value else {
            return Err(Error::validation(format!(
                "{} expects an object, got {}",
                self.name(),
                json_value_type(&value)
            )));
        };

        let mut instance = self.instance();
        for (name, value) in map {
            instance.set(&name, value)?;
        }
        Ok(instance)
    }

    fn check_property(&self, path: &str, name: &str, value: &Value) -> Result<()> {
        match self.def.properties.get(name) {
            Some(prop_type) => prop_type.check(path, value),
            None if self.def.additional_properties => Ok(()),
            None => Err(Error::validation(format!(
                "{} has no property '{}'",
                self.name(),
                name
            ))),
        }
    }

    // `null` on an optional property means unset, as it does for `set`
    fn check_properties(&self, path: &str, map: &Map<String, Value>) -> Result<()> {
        for (name, value) in map {
            if value.is_null() && !self.def.required.iter().any(|r| r == name) {
                continue;
            }
            self.check_property(&format!("{}.{}", path, name), name, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<model {}>", self.name())
    }
}

struct ClassBuilder<'a> {
    api: &'a ApiDescription,
    // Names of classes under construction, to stop at self-references
    building: Vec<String>,
}

impl ClassBuilder<'_> {
    fn build_class(&mut self, name: &str, shape: &ShapeDefinition) -> Result<ModelClass> {
        let api = self.api;
        let shape = api.deref(shape)?;
        self.building.push(name.to_string());

        let mut properties = IndexMap::new();
        if let Some(props) = shape.get("properties") {
            let props = props.as_object().ok_or_else(|| {
                Error::shape(format!("{}: 'properties' must be an object", name))
            })?;
            for (prop_name, prop_shape) in props {
                let prop_type = self.property_type(&format!("{}_{}", name, prop_name), prop_shape)?;
                properties.insert(prop_name.clone(), prop_type);
            }
        }

        self.building.pop();

        let required = shape
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModelClass {
            def: Arc::new(ClassDef {
                name: name.to_string(),
                shape: shape.clone(),
                properties,
                required,
                additional_properties: shape.get("additionalProperties") != Some(&Value::Bool(false)),
            }),
        })
    }

    fn property_type(&mut self, hint: &str, shape: &Value) -> Result<PropertyType> {
        // "#/definitions/Site" names the nested class "Site" when it carries no tag
        let referenced = shape
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|r| r.rsplit('/').next())
            .map(String::from);
        let api = self.api;
        let resolved = api.deref(shape)?;

        let declared = match resolved.get("type") {
            None => None,
            Some(Value::String(t)) => Some(t.as_str()),
            // ["string", "null"] style unions: the first non-null member wins
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            Some(other) => {
                return Err(Error::shape(format!(
                    "{}: unsupported type declaration {}",
                    hint, other
                )));
            }
        };

        match declared {
            Some("integer") => Ok(PropertyType::Integer),
            Some("number") => Ok(PropertyType::Number),
            Some("string") => Ok(PropertyType::String),
            Some("boolean") => Ok(PropertyType::Boolean),
            Some("null") => Ok(PropertyType::Null),
            Some("array") => {
                let items = resolved.get("items").ok_or_else(|| {
                    Error::shape(format!("{}: array property without an item shape", hint))
                })?;
                if !items.is_object() {
                    return Err(Error::shape(format!(
                        "{}: array item shape must be a single schema object",
                        hint
                    )));
                }
                let item_type = self.property_type(&format!("{}_item", hint), items)?;
                Ok(PropertyType::Array(Box::new(item_type)))
            }
            Some("object") => self.object_type(hint, referenced, resolved),
            None if resolved.get("properties").is_some() => {
                self.object_type(hint, referenced, resolved)
            }
            None => Ok(PropertyType::Any),
            Some(other) => Err(Error::shape(format!(
                "{}: unsupported property type '{}'",
                hint, other
            ))),
        }
    }

    fn object_type(
        &mut self,
        hint: &str,
        referenced: Option<String>,
        resolved: &Value,
    ) -> Result<PropertyType> {
        if resolved.get("properties").is_none() {
            return Ok(PropertyType::Object(None));
        }

        let name = resolved
            .get("x-model")
            .and_then(Value::as_str)
            .map(String::from)
            .or(referenced)
            .unwrap_or_else(|| hint.to_string());

        if self.building.contains(&name) {
            return Ok(PropertyType::Object(None));
        }

        Ok(PropertyType::Object(Some(self.build_class(&name, resolved)?)))
    }
}

/// A live instance of a [`ModelClass`]
#[derive(Debug, Clone)]
pub struct ModelInstance {
    class: ModelClass,
    values: Map<String, Value>,
}

impl ModelInstance {
    pub fn class(&self) -> &ModelClass {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Assign a property after checking it against the class; `null` clears it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.is_null() {
            self.values.remove(name);
            return Ok(());
        }

        self.class.check_property(name, name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Check that every required property is present and every value has its declared type.
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = self
            .class
            .required()
            .iter()
            .find(|name| !self.values.contains_key(name.as_str()))
        {
            return Err(Error::validation(format!(
                "{}: required property '{}' is missing",
                self.class.name(),
                missing
            )));
        }
        self.class.check_properties(self.class.name(), &self.values)
    }

    /// The current field values as a plain structured value
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl fmt::Display for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.class.name(), Value::Object(self.values.clone()))
    }
}

//! Data-model classes generated from shape definitions.

pub mod class;
pub mod registry;

pub use class::{ModelClass, ModelInstance, PropertyType};
pub use registry::ModelRegistry;

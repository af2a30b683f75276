//! Bijective id/name index over catalog entries.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Opaque item identifier: the integer or string an API uses as a key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl ItemId {
    /// Interpret a JSON value as an id; only integers and strings qualify.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ItemId::Int).ok_or_else(|| {
                Error::invariant(format!("item id {} is not a 64-bit integer", n))
            }),
            Value::String(s) => Ok(ItemId::Str(s.clone())),
            other => Err(Error::invariant(format!(
                "item id must be an integer or a string, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(i) => write!(f, "{}", i),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId::Int(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        ItemId::Str(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        ItemId::Str(id)
    }
}

/// One catalog record
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    id: ItemId,
    name: String,
    value: Value,
}

impl IndexEntry {
    pub fn new(id: ItemId, name: String, value: Value) -> Self {
        Self { id, name, value }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The item exactly as it appeared in the response
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Entries addressable by id and by name, with both mappings one-to-one
#[derive(Debug, Clone, Default)]
pub struct BijectiveIndex {
    entries: IndexMap<ItemId, IndexEntry>,
    by_name: HashMap<String, ItemId>,
}

impl BijectiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a repeated id or name is rejected and leaves the index unchanged.
    pub fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(Error::invariant(format!("duplicate item id {}", entry.id)));
        }
        if let Some(other) = self.by_name.get(&entry.name) {
            return Err(Error::invariant(format!(
                "duplicate item name '{}' (ids {} and {})",
                entry.name, other, entry.id
            )));
        }

        self.by_name.insert(entry.name.clone(), entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&IndexEntry> {
        self.by_name.get(name).and_then(|id| self.entries.get(id))
    }

    pub fn get_by_id(&self, id: &ItemId) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> indexmap::map::Values<'_, ItemId, IndexEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: i64, name: &str) -> IndexEntry {
        IndexEntry::new(ItemId::Int(id), name.to_string(), json!({"id": id, "name": name}))
    }

    #[test]
    fn test_bijection() {
        let mut index = BijectiveIndex::new();
        index.insert(entry(7, "Blue")).unwrap();
        index.insert(entry(8, "Red")).unwrap();

        for e in index.iter() {
            let by_name = index.get_by_name(e.name()).unwrap();
            assert_eq!(by_name.id(), e.id());
            assert_eq!(index.get_by_id(e.id()).unwrap().name(), e.name());
        }
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["Blue", "Red"]);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut index = BijectiveIndex::new();
        index.insert(entry(7, "Blue")).unwrap();

        assert!(matches!(index.insert(entry(7, "Red")), Err(Error::Invariant(_))));
        assert!(matches!(index.insert(entry(9, "Blue")), Err(Error::Invariant(_))));
        assert_eq!(index.len(), 1);
        assert!(!index.contains_name("Red"));
    }

    #[test]
    fn test_item_id_from_value() {
        assert_eq!(ItemId::from_value(&json!(7)).unwrap(), ItemId::Int(7));
        assert_eq!(ItemId::from_value(&json!("v1")).unwrap(), ItemId::from("v1"));
        assert!(matches!(
            ItemId::from_value(&json!(1.5)),
            Err(Error::Invariant(_))
        ));
        assert!(matches!(
            ItemId::from_value(&json!(null)),
            Err(Error::Invariant(_))
        ));
        assert_eq!(ItemId::Int(7).to_string(), "7");
    }
}

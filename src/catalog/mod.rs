//! Catalog indexer.
//!
//! Wraps a request whose response carries a collection and turns each
//! response into a name- and id-addressable catalog. The collection is the
//! first declared property of the response object and must be either an
//! object of objects or an array of objects; this is checked once, when the
//! indexer is created.
//!
//! Ids and names come from a [`KeySource`]. Left at [`KeySource::Default`],
//! object-of-objects collections use each entry's key as both id and name,
//! while array collections read each item's `id` and `name` properties and
//! fail if an item lacks one.
//!
//! Refreshing a catalog (`run`, `rerun`) needs `&mut self`; callers that share
//! an indexer across tasks must serialize writers themselves.

pub mod index;

pub use index::{BijectiveIndex, IndexEntry, ItemId};

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::dispatch::{CallOutcome, Request};
use crate::error::{Error, Result};
use crate::spec::ApiDescription;
use crate::transport::Arguments;

const DEFAULT_STATUS_CODE: &str = "200";
const DEFAULT_ID_PROPERTY: &str = "id";
const DEFAULT_NAME_PROPERTY: &str = "name";

pub type ItemKeyFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type EntryKeyFn = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// Where an item's id or name comes from
#[derive(Clone, Default)]
pub enum KeySource {
    /// The entry key for object collections; the `id`/`name` property for arrays
    #[default]
    Default,
    /// A property of each item
    Property(String),
    /// A function of the item
    Item(ItemKeyFn),
    /// A function of the entry key (array position for arrays) and the item
    Entry(EntryKeyFn),
}

impl KeySource {
    pub fn property<S: Into<String>>(name: S) -> Self {
        KeySource::Property(name.into())
    }

    pub fn item<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        KeySource::Item(Arc::new(f))
    }

    pub fn entry<F>(f: F) -> Self
    where
        F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        KeySource::Entry(Arc::new(f))
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Default => f.write_str("Default"),
            KeySource::Property(name) => f.debug_tuple("Property").field(name).finish(),
            KeySource::Item(_) => f.write_str("Item(<fn>)"),
            KeySource::Entry(_) => f.write_str("Entry(<fn>)"),
        }
    }
}

/// Indexer settings
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    id_from: KeySource,
    name_from: KeySource,
    status_code: String,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            id_from: KeySource::Default,
            name_from: KeySource::Default,
            status_code: DEFAULT_STATUS_CODE.to_string(),
        }
    }
}

impl IndexerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_from(mut self, source: KeySource) -> Self {
        self.id_from = source;
        self
    }

    pub fn name_from(mut self, source: KeySource) -> Self {
        self.name_from = source;
        self
    }

    /// Status code whose declared response shape describes the collection
    pub fn status_code<S: Into<String>>(mut self, status_code: S) -> Self {
        self.status_code = status_code.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionKind {
    ObjectOfObjects,
    ArrayOfObjects,
}

type Extractor = Arc<dyn Fn(&str, &Value) -> Result<Value> + Send + Sync>;

fn extractor(source: &KeySource, kind: CollectionKind, default_property: &'static str) -> Extractor {
    match (source, kind) {
        (KeySource::Default, CollectionKind::ObjectOfObjects) => {
            Arc::new(|key: &str, _: &Value| -> Result<Value> { Ok(Value::String(key.to_string())) })
        }
        (KeySource::Default, CollectionKind::ArrayOfObjects) => {
            property_extractor(default_property.to_string())
        }
        (KeySource::Property(name), _) => property_extractor(name.clone()),
        (KeySource::Item(f), _) => {
            let f = Arc::clone(f);
            Arc::new(move |_: &str, item: &Value| -> Result<Value> { Ok(f(item)) })
        }
        (KeySource::Entry(f), _) => {
            let f = Arc::clone(f);
            Arc::new(move |key: &str, item: &Value| -> Result<Value> { Ok(f(key, item)) })
        }
    }
}

fn property_extractor(property: String) -> Extractor {
    Arc::new(move |key: &str, item: &Value| -> Result<Value> {
        item.get(property.as_str()).cloned().ok_or_else(|| {
            Error::invariant(format!("item '{}' has no property '{}'", key, property))
        })
    })
}

fn is_object_shape(shape: &Value) -> bool {
    match shape.get("type").and_then(Value::as_str) {
        Some(t) => t == "object",
        None => shape.get("properties").is_some(),
    }
}

/// Find the collection property of a response shape and classify it.
fn inspect_collection(api: &ApiDescription, response: &Value) -> Result<(String, CollectionKind)> {
    let response = api.deref(response)?;
    if !is_object_shape(response) {
        return Err(Error::shape("response is not an object type"));
    }

    let (property, shape) = response
        .get("properties")
        .and_then(Value::as_object)
        .and_then(|props| props.iter().next())
        .ok_or_else(|| Error::shape("response object declares no properties"))?;
    let shape = api.deref(shape)?;

    let kind = match shape.get("type").and_then(Value::as_str) {
        Some("object") if shape.get("properties").is_some() => CollectionKind::ObjectOfObjects,
        Some("object") => {
            let items = shape
                .get("additionalProperties")
                .filter(|v| v.is_object())
                .ok_or_else(|| {
                    Error::shape(format!("'{}' declares neither properties nor item shape", property))
                })?;
            if !is_object_shape(api.deref(items)?) {
                return Err(Error::shape(format!("'{}' items are not objects", property)));
            }
            CollectionKind::ObjectOfObjects
        }
        Some("array") => {
            let items = shape
                .get("items")
                .ok_or_else(|| Error::shape(format!("'{}' declares no item shape", property)))?;
            if !is_object_shape(api.deref(items)?) {
                return Err(Error::shape(format!("'{}' items are not objects", property)));
            }
            CollectionKind::ArrayOfObjects
        }
        other => {
            return Err(Error::shape(format!(
                "unsupported collection shape for '{}': {}",
                property,
                other.unwrap_or("untyped")
            )));
        }
    };

    Ok((property.clone(), kind))
}

fn name_text(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Null => Err(Error::invariant("item name is null")),
        other => Ok(other.to_string()),
    }
}

/// Bidirectional id/name catalog over a collection-returning request
pub struct CatalogIndexer {
    request: Request,
    collection_property: String,
    kind: CollectionKind,
    id_from: Extractor,
    name_from: Extractor,
    index: BijectiveIndex,
    last_args: Arguments,
}

impl CatalogIndexer {
    /// Create an empty indexer, checking the request's declared response shape.
    pub fn new(request: Request, options: IndexerOptions) -> Result<Self> {
        let response = request
            .operation()
            .declared_response_shape(&options.status_code)
            .ok_or_else(|| {
                Error::invariant(format!(
                    "{} {} declares no response shape for status {}",
                    request.method(),
                    request.path(),
                    options.status_code
                ))
            })?;
        let (collection_property, kind) = inspect_collection(request.client().api(), response)?;
        debug!(
            "indexing {} {} via '{}' ({:?})",
            request.method(),
            request.path(),
            collection_property,
            kind
        );

        Ok(Self {
            id_from: extractor(&options.id_from, kind, DEFAULT_ID_PROPERTY),
            name_from: extractor(&options.name_from, kind, DEFAULT_NAME_PROPERTY),
            request,
            collection_property,
            kind,
            index: BijectiveIndex::new(),
            last_args: Arguments::new(),
        })
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Name of the response property holding the collection
    pub fn collection_property(&self) -> &str {
        &self.collection_property
    }

    /// Fetch the collection and replace the catalog with it.
    ///
    /// The current catalog is kept if the request fails or the items cannot
    /// be indexed.
    pub async fn run(&mut self, args: Arguments) -> Result<()> {
        let outcome = self.request.call(args.clone()).await?;
        let payload = match outcome {
            CallOutcome::Success(payload) => payload.into_value(),
            CallOutcome::Failure(details) => {
                return Err(Error::operational(format!(
                    "unable to get items from {} {}: {}",
                    self.request.method(),
                    self.request.path(),
                    details
                )));
            }
        };

        let collection = payload
            .get(self.collection_property.as_str())
            .ok_or_else(|| {
                Error::invariant(format!(
                    "response has no '{}' property",
                    self.collection_property
                ))
            })?;
        let index = self.ingest(collection)?;

        info!(
            "catalog for {} {} now holds {} items",
            self.request.method(),
            self.request.path(),
            index.len()
        );
        self.index = index;
        self.last_args = args;
        Ok(())
    }

    /// Run again with the arguments of the last successful run.
    pub async fn rerun(&mut self) -> Result<()> {
        let args = self.last_args.clone();
        self.run(args).await
    }

    fn ingest(&self, collection: &Value) -> Result<BijectiveIndex> {
        let mut index = BijectiveIndex::new();
        match self.kind {
            CollectionKind::ObjectOfObjects => {
                let items = collection.as_object().ok_or_else(|| {
                    Error::invariant(format!("'{}' is not an object", self.collection_property))
                })?;
                for (key, item) in items {
                    index.insert(self.entry(key, item)?)?;
                }
            }
            CollectionKind::ArrayOfObjects => {
                let items = collection.as_array().ok_or_else(|| {
                    Error::invariant(format!("'{}' is not an array", self.collection_property))
                })?;
                for (position, item) in items.iter().enumerate() {
                    index.insert(self.entry(&position.to_string(), item)?)?;
                }
            }
        }
        Ok(index)
    }

    fn entry(&self, key: &str, item: &Value) -> Result<IndexEntry> {
        let id = ItemId::from_value(&(self.id_from)(key, item)?)?;
        let name = name_text((self.name_from)(key, item)?)?;
        Ok(IndexEntry::new(id, name, item.clone()))
    }

    /// The entry named `name`, if any
    pub fn find(&self, name: &str) -> Option<&IndexEntry> {
        self.index.get_by_name(name)
    }

    pub fn entry_by_id(&self, id: &ItemId) -> Option<&IndexEntry> {
        self.index.get_by_id(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_name(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Values<'_, ItemId, IndexEntry> {
        self.index.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.names()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.index.ids()
    }

    pub fn last_arguments(&self) -> &Arguments {
        &self.last_args
    }
}

impl Index<&str> for CatalogIndexer {
    type Output = IndexEntry;

    /// # Panics
    ///
    /// Panics if no entry has that name; use [`CatalogIndexer::find`] to probe.
    fn index(&self, name: &str) -> &IndexEntry {
        match self.find(name) {
            Some(entry) => entry,
            None => panic!("item name {} not found in catalog", name),
        }
    }
}

impl<'a> IntoIterator for &'a CatalogIndexer {
    type Item = &'a IndexEntry;
    type IntoIter = indexmap::map::Values<'a, ItemId, IndexEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for CatalogIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogIndexer")
            .field("path", &self.request.path())
            .field("collection_property", &self.collection_property)
            .field("kind", &self.kind)
            .field("count", &self.index.len())
            .finish()
    }
}

impl fmt::Display for CatalogIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = json!({
            "path": self.request.path(),
            "count": self.index.len(),
            "names": self.names().collect::<Vec<_>>(),
        });
        let text = serde_json::to_string_pretty(&summary).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

//! Document store collaborator
//!
//! Tasks and custom requests live as JSON documents in a store that is the
//! single source of truth for every session. The store:
//!
//! - assigns document ids (UUIDv7) on create
//! - resolves [`FieldValue::ServerTimestamp`] to its own clock
//! - answers filtered, ordered queries
//! - publishes a change feed per collection, which [`Subscription`] turns
//!   into a sequence of full result-set snapshots
//!
//! [`FjallDocumentStore`] is the embedded implementation. Everything above
//! this module talks to the [`DocumentStore`] trait.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dataharvest::docstore::{Collection, FjallDocumentStore, Query, Direction};
//!
//! let store = FjallDocumentStore::open("data/store")?;
//! let query = Query::new(Collection::Tasks)
//!     .filter_eq("userId", "user-1")
//!     .order_by("createdAt", Direction::Desc);
//! let docs = store.query(&query).await?;
//! ```

pub mod error;
mod kv;
pub mod partitions;
mod store;
mod subscription;

pub use error::{Result, StoreError};
pub use kv::{FjallKeyValue, KeyValueStore};
pub use store::FjallDocumentStore;
pub use subscription::Subscription;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Named collections the store serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Tasks,
    CustomRequests,
}

impl Collection {
    /// Public collection name, as used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Tasks => "scrapingTasks",
            Collection::CustomRequests => "customRequests",
        }
    }

    pub(crate) fn partition(&self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::CustomRequests => "custom_requests",
        }
    }
}

/// Value written to a document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock at commit time
    ServerTimestamp,
    /// Removes the field (updates only)
    Delete,
}

impl FieldValue {
    pub fn of(value: impl Into<Value>) -> Self {
        FieldValue::Value(value.into())
    }
}

/// Field map for create/update calls
pub type Fields = BTreeMap<String, FieldValue>;

/// A stored document: id plus its JSON fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Decode into a typed model; the id is exposed to the model as `id`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filtered, ordered, limited read over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filter: Option<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match &self.filter {
            Some((field, expected)) => doc.get(field) == Some(expected),
            None => true,
        }
    }

    /// Apply ordering and limit to an already-filtered result set
    pub fn finish(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                // Ids are UUIDv7, so they break ties in creation order
                let ord = compare_values(a.get(field), b.get(field)).then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Guard evaluated against the stored document before a conditional write.
/// A missing field compares as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    Equals(String, Value),
    NotEquals(String, Value),
}

impl Precondition {
    pub fn holds(&self, data: &Map<String, Value>) -> bool {
        match self {
            Precondition::Equals(field, expected) => {
                data.get(field).unwrap_or(&Value::Null) == expected
            }
            Precondition::NotEquals(field, expected) => {
                data.get(field).unwrap_or(&Value::Null) != expected
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Emitted on the collection's change feed after a committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return its store-assigned id
    async fn create(&self, collection: Collection, fields: Fields) -> Result<String>;

    /// Merge fields into an existing document
    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<()>;

    /// Merge fields only if `precondition` holds; returns whether the write happened
    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        precondition: Precondition,
        fields: Fields,
    ) -> Result<bool>;

    /// Delete a document; deleting an unknown id is a no-op
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Change feed for a collection
    fn watch(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent>;
}

/// Total order over JSON values used for `order_by`:
/// null < bool < number < string, arrays and objects last
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

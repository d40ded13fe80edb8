use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::partitions::{decode_doc_key, doc_prefix, encode_doc_key};
use super::{
    ChangeEvent, ChangeKind, Collection, Document, DocumentStore, FieldValue, Fields,
    Precondition, Query,
};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Fjall-backed document store with per-collection change feeds
#[derive(Clone)]
pub struct FjallDocumentStore {
    keyspace: Keyspace,
    partitions: HashMap<Collection, PartitionHandle>,
    feeds: HashMap<Collection, broadcast::Sender<ChangeEvent>>,
    // serialises read-modify-write cycles
    write_lock: Arc<Mutex<()>>,
}

impl FjallDocumentStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening document store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let mut partitions = HashMap::new();
        let mut feeds = HashMap::new();
        for collection in [Collection::Tasks, Collection::CustomRequests] {
            let handle =
                keyspace.open_partition(collection.partition(), PartitionCreateOptions::default())?;
            partitions.insert(collection, handle);
            feeds.insert(collection, broadcast::channel(CHANGE_FEED_CAPACITY).0);
        }

        info!("Document store opened successfully");
        Ok(Self {
            keyspace,
            partitions,
            feeds,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Keyspace handle, shared with the preference key-value store
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> Result<usize> {
        let mut count = 0;
        for item in self.partition(collection).prefix(doc_prefix()) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn partition(&self, collection: Collection) -> &PartitionHandle {
        // every Collection variant is opened in `open`
        &self.partitions[&collection]
    }

    fn read(&self, collection: Collection, id: &str) -> Result<Option<Map<String, Value>>> {
        match self.partition(collection).get(encode_doc_key(id))? {
            Some(bytes) => match serde_json::from_slice(&bytes)? {
                Value::Object(map) => Ok(Some(map)),
                _ => Err(StoreError::NotAnObject(id.to_string())),
            },
            None => Ok(None),
        }
    }

    fn write(&self, collection: Collection, id: &str, data: &Map<String, Value>) -> Result<()> {
        let value = serde_json::to_vec(data)?;
        self.partition(collection).insert(encode_doc_key(id), value)?;
        Ok(())
    }

    fn publish(&self, collection: Collection, id: &str, kind: ChangeKind) {
        let event = ChangeEvent {
            collection,
            id: id.to_string(),
            kind,
        };
        // No receivers is fine: nobody is subscribed right now
        let _ = self.feeds[&collection].send(event);
    }
}

/// Current store time as a fixed-width RFC 3339 string, so that string order
/// matches chronological order
pub(crate) fn server_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn apply_fields(data: &mut Map<String, Value>, fields: Fields) {
    let now = server_timestamp();
    for (key, value) in fields {
        match value {
            FieldValue::Value(v) => {
                data.insert(key, v);
            }
            FieldValue::ServerTimestamp => {
                data.insert(key, Value::String(now.clone()));
            }
            FieldValue::Delete => {
                data.remove(&key);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FjallDocumentStore {
    async fn create(&self, collection: Collection, fields: Fields) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let mut data = Map::new();
        apply_fields(&mut data, fields);

        {
            let _guard = self.write_lock.lock().await;
            self.write(collection, &id, &data)?;
        }

        debug!(collection = collection.name(), %id, "Document created");
        self.publish(collection, &id, ChangeKind::Created);
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<()> {
        {
            let _guard = self.write_lock.lock().await;
            let mut data = self.read(collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.name(),
                id: id.to_string(),
            })?;
            apply_fields(&mut data, fields);
            self.write(collection, id, &data)?;
        }

        debug!(collection = collection.name(), %id, "Document updated");
        self.publish(collection, id, ChangeKind::Updated);
        Ok(())
    }

    async fn update_if(
        &self,
        collection: Collection,
        id: &str,
        precondition: Precondition,
        fields: Fields,
    ) -> Result<bool> {
        {
            let _guard = self.write_lock.lock().await;
            let mut data = self.read(collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.name(),
                id: id.to_string(),
            })?;
            if !precondition.holds(&data) {
                debug!(collection = collection.name(), %id, "Conditional update skipped");
                return Ok(false);
            }
            apply_fields(&mut data, fields);
            self.write(collection, id, &data)?;
        }

        debug!(collection = collection.name(), %id, "Conditional update applied");
        self.publish(collection, id, ChangeKind::Updated);
        Ok(true)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let existed = {
            let _guard = self.write_lock.lock().await;
            let key = encode_doc_key(id);
            let existed = self.partition(collection).get(&key)?.is_some();
            if existed {
                self.partition(collection).remove(key)?;
            }
            existed
        };

        if existed {
            debug!(collection = collection.name(), %id, "Document deleted");
            self.publish(collection, id, ChangeKind::Deleted);
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self.read(collection, id)?.map(|data| Document {
            id: id.to_string(),
            data,
        }))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut docs = Vec::new();

        for item in self.partition(query.collection).prefix(doc_prefix()) {
            let (key, value) = item?;
            let Some(id) = decode_doc_key(&key) else {
                warn!(collection = query.collection.name(), "Skipping malformed key");
                continue;
            };
            let data = match serde_json::from_slice::<Value>(&value)? {
                Value::Object(map) => map,
                _ => {
                    warn!(collection = query.collection.name(), %id, "Skipping non-object document");
                    continue;
                }
            };
            let doc = Document { id, data };
            if query.matches(&doc) {
                docs.push(doc);
            }
        }

        Ok(query.finish(docs))
    }

    fn watch(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        self.feeds[&collection].subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::Direction;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallDocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallDocumentStore::open(temp_dir.path().join("test_store")).unwrap();
        (store, temp_dir)
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, _temp) = create_test_store();

        let id = store
            .create(
                Collection::Tasks,
                fields(&[
                    ("userId", FieldValue::of("u1")),
                    ("createdAt", FieldValue::ServerTimestamp),
                ]),
            )
            .await
            .unwrap();

        let doc = store.get(Collection::Tasks, &id).await.unwrap().unwrap();
        assert_eq!(doc.get("userId"), Some(&json!("u1")));
        let stamped = doc.get("createdAt").and_then(Value::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamped).is_ok());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let (store, _temp) = create_test_store();
        let id = store
            .create(Collection::Tasks, fields(&[("a", FieldValue::of(1))]))
            .await
            .unwrap();

        assert!(store.get(Collection::CustomRequests, &id).await.unwrap().is_none());
        assert_eq!(store.count(Collection::Tasks).unwrap(), 1);
        assert_eq!(store.count(Collection::CustomRequests).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_merges_and_deletes_fields() {
        let (store, _temp) = create_test_store();
        let id = store
            .create(
                Collection::Tasks,
                fields(&[("a", FieldValue::of(1)), ("b", FieldValue::of(2))]),
            )
            .await
            .unwrap();

        store
            .update(
                Collection::Tasks,
                &id,
                fields(&[("a", FieldValue::of(10)), ("b", FieldValue::Delete)]),
            )
            .await
            .unwrap();

        let doc = store.get(Collection::Tasks, &id).await.unwrap().unwrap();
        assert_eq!(doc.get("a"), Some(&json!(10)));
        assert!(doc.get("b").is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let (store, _temp) = create_test_store();
        let err = store
            .update(Collection::Tasks, "missing", Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_if_is_a_latch() {
        let (store, _temp) = create_test_store();
        let id = store
            .create(Collection::Tasks, fields(&[("status", FieldValue::of("completed"))]))
            .await
            .unwrap();

        let latch = || Precondition::NotEquals("notified".into(), json!(true));
        let flip = || fields(&[("notified", FieldValue::of(true))]);

        assert!(store.update_if(Collection::Tasks, &id, latch(), flip()).await.unwrap());
        assert!(!store.update_if(Collection::Tasks, &id, latch(), flip()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_publishes_once() {
        let (store, _temp) = create_test_store();
        let id = store
            .create(Collection::Tasks, fields(&[("a", FieldValue::of(1))]))
            .await
            .unwrap();

        let mut feed = store.watch(Collection::Tasks);
        store.delete(Collection::Tasks, &id).await.unwrap();
        store.delete(Collection::Tasks, &id).await.unwrap();

        let event = feed.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert!(feed.try_recv().is_err());
        assert!(store.get(Collection::Tasks, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_orders_newest_first() {
        let (store, _temp) = create_test_store();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = store
                .create(
                    Collection::Tasks,
                    fields(&[
                        ("userId", FieldValue::of("u1")),
                        ("createdAt", FieldValue::ServerTimestamp),
                    ]),
                )
                .await
                .unwrap();
            ids.push(id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        store
            .create(Collection::Tasks, fields(&[("userId", FieldValue::of("u2"))]))
            .await
            .unwrap();

        let query = Query::new(Collection::Tasks)
            .filter_eq("userId", "u1")
            .order_by("createdAt", Direction::Desc);
        let found: Vec<String> = store
            .query(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();

        ids.reverse();
        assert_eq!(found, ids);
    }

    #[tokio::test]
    async fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store");

        let id = {
            let store = FjallDocumentStore::open(&path).unwrap();
            let id = store
                .create(Collection::CustomRequests, fields(&[("a", FieldValue::of("x"))]))
                .await
                .unwrap();
            store.persist().unwrap();
            id
        };

        let store = FjallDocumentStore::open(&path).unwrap();
        let doc = store.get(Collection::CustomRequests, &id).await.unwrap().unwrap();
        assert_eq!(doc.get("a"), Some(&json!("x")));
    }
}

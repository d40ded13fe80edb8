use std::marker::PhantomData;
use std::sync::Arc;

use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::error::Result;
use super::{ChangeEvent, Document, DocumentStore, Query};

/// Cancellable handle over a live query.
///
/// Produces a lazy, non-restartable sequence of full snapshots: the first
/// [`next`](Subscription::next) resolves immediately with the current result
/// set, every later call waits for a change that alters the result set.
/// Dropping the handle (or calling [`cancel`](Subscription::cancel)) releases
/// the change feed.
pub struct Subscription<T> {
    source: Option<Source>,
    last: Option<Vec<Document>>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

struct Source {
    store: Arc<dyn DocumentStore>,
    query: Query,
    changes: broadcast::Receiver<ChangeEvent>,
}

impl<T: DeserializeOwned> Subscription<T> {
    pub fn new(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        // Subscribe before the first read so no change can slip in between
        let changes = store.watch(query.collection);
        debug!(collection = query.collection.name(), "Subscription started");
        Self {
            source: Some(Source {
                store,
                query,
                changes,
            }),
            last: None,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Subscription without a query: one empty snapshot, then the end
    pub fn empty() -> Self {
        Self {
            source: None,
            last: None,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Next full snapshot, or `None` once the sequence has ended
    pub async fn next(&mut self) -> Option<Result<Vec<T>>> {
        if self.done {
            return None;
        }

        let Some(source) = self.source.as_mut() else {
            self.done = true;
            return Some(Ok(Vec::new()));
        };

        loop {
            if self.last.is_some() {
                match source.changes.recv().await {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged, re-reading");
                    }
                    Err(RecvError::Closed) => {
                        self.done = true;
                        return None;
                    }
                }
            }

            let docs = match source.store.query(&source.query).await {
                Ok(docs) => docs,
                Err(err) => return Some(Err(err)),
            };

            // Changes to documents outside the result set are not deliveries
            if self.last.as_ref() == Some(&docs) {
                continue;
            }

            let items = decode_all(&docs);
            self.last = Some(docs);
            return Some(Ok(items));
        }
    }

    /// Stop listening and release the change feed
    pub fn cancel(self) {
        if let Some(source) = &self.source {
            debug!(collection = source.query.collection.name(), "Subscription cancelled");
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|item| (item, sub))
        })
    }
}

fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(id = %doc.id, %err, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{Collection, FieldValue, Fields, FjallDocumentStore};
    use futures::StreamExt;
    use serde::Deserialize;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
        owner: String,
    }

    fn owned(owner: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("owner".into(), FieldValue::of(owner));
        fields
    }

    fn open() -> (Arc<dyn DocumentStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallDocumentStore::open(temp_dir.path().join("sub")).unwrap();
        (Arc::new(store), temp_dir)
    }

    #[tokio::test]
    async fn test_first_snapshot_is_immediate() {
        let (store, _temp) = open();
        store.create(Collection::Tasks, owned("a")).await.unwrap();

        let query = Query::new(Collection::Tasks).filter_eq("owner", "a");
        let mut sub: Subscription<Item> = Subscription::new(store, query);
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].owner, "a");
    }

    #[tokio::test]
    async fn test_delivers_after_matching_change_only() {
        let (store, _temp) = open();
        let query = Query::new(Collection::Tasks).filter_eq("owner", "a");
        let mut sub: Subscription<Item> = Subscription::new(store.clone(), query);
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        store.create(Collection::Tasks, owned("b")).await.unwrap();
        let id = store.create(Collection::Tasks, owned("a")).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
    }

    #[tokio::test]
    async fn test_empty_subscription_ends() {
        let mut sub: Subscription<Item> = Subscription::empty();
        assert!(sub.next().await.unwrap().unwrap().is_empty());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let (store, _temp) = open();
        let mut fields = Fields::new();
        fields.insert("owner".into(), FieldValue::of(42));
        store.create(Collection::Tasks, fields).await.unwrap();
        store.create(Collection::Tasks, owned("a")).await.unwrap();

        let mut sub: Subscription<Item> = Subscription::new(store, Query::new(Collection::Tasks));
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        let (store, _temp) = open();
        store.create(Collection::Tasks, owned("a")).await.unwrap();

        let sub: Subscription<Item> = Subscription::new(store, Query::new(Collection::Tasks));
        let mut stream = Box::pin(sub.into_stream());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
    }
}

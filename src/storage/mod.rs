//! Blob storage for exported files and request attachments

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, path::Path as StoragePath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid storage root: {0}")]
    InvalidRoot(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::ObjectStore(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: usize,
}

/// Keyed blob store over any `object_store` backend
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
}

impl StorageClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Files under `root`; the directory is created if missing
    pub fn local(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let fs = LocalFileSystem::new_with_prefix(root.as_ref())?;
        Ok(Self::new(Arc::new(fs)))
    }

    pub async fn put(&self, key: &str, data: impl Into<Bytes>) -> Result<StoredObject> {
        let data = data.into();
        let size = data.len();
        self.store.put(&StoragePath::from(key), data.into()).await?;

        tracing::info!(key, size, "Stored object");
        Ok(StoredObject {
            key: key.to_string(),
            size,
        })
    }

    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let result = self.store.get(&StoragePath::from(key)).await?;
        let bytes = result.bytes().await?;
        tracing::debug!(key, size = bytes.len(), "Read object");
        Ok(bytes)
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&StoragePath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let storage = StorageClient::in_memory();
        let stored = storage.put("exports/a.csv", b"x,y".to_vec()).await.unwrap();
        assert_eq!(stored.size, 3);
        assert!(storage.exists("exports/a.csv").await.unwrap());
        assert_eq!(storage.get("exports/a.csv").await.unwrap().as_ref(), b"x,y");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let storage = StorageClient::in_memory();
        assert!(!storage.exists("nope").await.unwrap());
        assert!(matches!(storage.get("nope").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_writes_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("exports");
        let storage = StorageClient::local(&root).unwrap();
        storage.put("amazon_data.json", Bytes::from_static(b"[]")).await.unwrap();
        assert!(root.join("amazon_data.json").exists());
    }
}

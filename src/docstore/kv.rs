use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::debug;

use super::error::Result;
use super::partitions::encode_pref_key;

/// String key-value store for small per-installation settings
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Key-value store living in the `preferences` partition of the document
/// store's keyspace
#[derive(Clone)]
pub struct FjallKeyValue {
    partition: PartitionHandle,
}

impl FjallKeyValue {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let partition =
            keyspace.open_partition("preferences", PartitionCreateOptions::default())?;
        Ok(Self { partition })
    }
}

impl KeyValueStore for FjallKeyValue {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .partition
            .get(encode_pref_key(key))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.partition
            .insert(encode_pref_key(key), value.as_bytes())?;
        debug!(key, value, "Preference saved");
        Ok(())
    }
}

//! In-memory API key store.
//!
//! Fast, thread-safe storage suitable for development, testing,
//! and as the working set behind [`FileKeyStore`](crate::FileKeyStore).

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use solbal_core::error::Result;
use solbal_core::traits::ApiKeyStore;
use solbal_core::types::ApiKeyRecord;

/// In-memory API key store.
///
/// All operations are thread-safe and can be called concurrently.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    /// key → record
    keys: DashMap<String, ApiKeyRecord>,
}

impl MemoryKeyStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored record (for persistence/backup).
    pub fn records(&self) -> Vec<ApiKeyRecord> {
        let mut records: Vec<_> = self.keys.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));
        records
    }

    /// Imports records, replacing any with the same key.
    pub fn import(&self, records: Vec<ApiKeyRecord>) -> usize {
        let count = records.len();
        for record in records {
            self.keys.insert(record.key.clone(), record);
        }
        count
    }

    /// Returns the record for `key`.
    pub fn get(&self, key: &str) -> Option<ApiKeyRecord> {
        self.keys.get(key).map(|e| e.value().clone())
    }

    /// Removes `key`, returning its record.
    pub fn remove(&self, key: &str) -> Option<ApiKeyRecord> {
        self.keys.remove(key).map(|(_, record)| record)
    }

    /// Removes every key.
    pub fn clear(&self) {
        self.keys.clear();
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryKeyStore {
    async fn is_active(&self, key: &str) -> Result<bool> {
        Ok(self.keys.get(key).is_some_and(|e| e.active))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.keys.contains_key(key))
    }

    #[instrument(skip_all)]
    async fn insert(&self, key: &str) -> Result<()> {
        self.keys
            .entry(key.to_owned())
            .and_modify(|record| record.active = true)
            .or_insert_with(|| ApiKeyRecord::new(key));
        debug!(total = self.keys.len(), "API key stored");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deactivate(&self, key: &str) -> Result<bool> {
        match self.keys.get_mut(key) {
            Some(mut record) => {
                record.active = false;
                debug!("API key deactivated");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.keys.len() as u64)
    }
}

//! File-backed API key store.
//!
//! Keys live in memory and are written to a JSON file after every change.
//! Suitable for single-node deployments where keys must survive restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use solbal_core::error::{Result, SolbalError};
use solbal_core::traits::ApiKeyStore;
use solbal_core::types::ApiKeyRecord;

use crate::MemoryKeyStore;

/// File-backed API key store.
///
/// # File Format
///
/// A JSON array of records:
///
/// ```text
/// [{"key": "...", "active": true, "createdAt": "2024-01-01T00:00:00Z"}]
/// ```
pub struct FileKeyStore {
    /// Path to the storage file
    path: PathBuf,
    /// Working set
    memory: MemoryKeyStore,
    /// Serializes writers so saves never interleave
    write_lock: Mutex<()>,
}

impl FileKeyStore {
    /// Opens the store at `path`, loading it if the file exists.
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first write.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            memory: MemoryKeyStore::new(),
            write_lock: Mutex::new(()),
        };

        if fs::try_exists(&store.path).await? {
            store.load().await?;
        }

        Ok(store)
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    async fn load(&self) -> Result<()> {
        let contents = fs::read(&self.path).await?;
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let records: Vec<ApiKeyRecord> = serde_json::from_slice(&contents).map_err(|e| {
            SolbalError::KeyStoreError(format!("{} is not a key file: {e}", self.path.display()))
        })?;
        let count = self.memory.import(records);

        info!(count, "Loaded API keys");
        Ok(())
    }

    /// Writes every key to disk (temp file, then rename).
    pub async fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_file().await
    }

    async fn write_file(&self) -> Result<()> {
        let records = self.memory.records();
        let serialized = serde_json::to_vec_pretty(&records)?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;

        debug!(count = records.len(), path = ?self.path, "Key file saved");
        Ok(())
    }

    /// Puts `key` back the way it was before a write that failed to save.
    fn restore(&self, key: &str, previous: Option<ApiKeyRecord>) {
        match previous {
            Some(record) => {
                self.memory.import(vec![record]);
            }
            None => {
                self.memory.remove(key);
            }
        }
    }
}

#[async_trait]
impl ApiKeyStore for FileKeyStore {
    async fn is_active(&self, key: &str) -> Result<bool> {
        self.memory.is_active(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.memory.exists(key).await
    }

    async fn insert(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.memory.get(key);
        self.memory.insert(key).await?;
        if let Err(err) = self.write_file().await {
            warn!(error = %err, "Key file save failed, rolling back insert");
            self.restore(key, previous);
            return Err(err);
        }
        Ok(())
    }

    async fn deactivate(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let previous = self.memory.get(key);
        if !self.memory.deactivate(key).await? {
            return Ok(false);
        }
        if let Err(err) = self.write_file().await {
            warn!(error = %err, "Key file save failed, rolling back deactivation");
            self.restore(key, previous);
            return Err(err);
        }
        Ok(true)
    }

    async fn count(&self) -> Result<u64> {
        self.memory.count().await
    }
}

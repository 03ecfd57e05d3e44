//! Common traits for solbal.
//!
//! These traits are the seams between the cache and its collaborators,
//! enabling modularity and testing.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Balance;

// ═══════════════════════════════════════════════════════════════════════════════
// UPSTREAM RESOLVER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// The slow, fallible lookup the cache sits in front of.
///
/// Implementations must tolerate concurrent calls for different keys. The
/// cache guarantees that calls for the same key never overlap.
#[async_trait]
pub trait BalanceResolver: Send + Sync {
    /// Fetches the current balance for `key`.
    async fn resolve(&self, key: &str) -> Result<Balance>;

    /// Rejects malformed keys before any cache or upstream work.
    ///
    /// The default accepts everything.
    fn validate_key(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API KEY STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for API key storage.
///
/// Implementations might use:
/// - In-memory storage (for testing/development)
/// - A JSON file (for single-node deployments)
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Returns true if `key` exists and is active.
    async fn is_active(&self, key: &str) -> Result<bool>;

    /// Returns true if `key` exists, active or not.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Inserts a new active key. Inserting an existing key reactivates it.
    async fn insert(&self, key: &str) -> Result<()>;

    /// Marks `key` inactive. Returns false if it did not exist.
    async fn deactivate(&self, key: &str) -> Result<bool>;

    /// Returns the number of stored keys.
    async fn count(&self) -> Result<u64>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ALERT SINK TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Fire-and-forget channel for operator alerts.
///
/// `notify` must not block and must not fail; delivery problems are the
/// sink's own concern.
pub trait AlertSink: Send + Sync {
    /// Sends `message` to the operators.
    fn notify(&self, message: String);
}

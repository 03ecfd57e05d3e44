//! # solbal Keys
//!
//! API key storage for the balance service.
//!
//! This crate provides two [`ApiKeyStore`] backends:
//!
//! - **Memory**: in-process storage for development and testing
//! - **File**: JSON file storage for single-node deployments
//!
//! ## Example
//!
//! ```rust,ignore
//! use solbal_keys::{generate_api_key, seed_default_key, FileKeyStore};
//!
//! let store = FileKeyStore::open("keys.json").await?;
//! seed_default_key(&store, "dev-key").await?;
//! let key = generate_api_key();
//! store.insert(&key).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;

pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;

// Re-export the trait from core
pub use solbal_core::traits::ApiKeyStore;

use rand::RngCore;
use tracing::info;

use solbal_core::error::Result;

/// Number of random bytes in a generated key.
const API_KEY_BYTES: usize = 32;

/// Inserts `key` as an active key unless the store already knows it.
///
/// Returns true if the key was inserted. A key that exists but was
/// deactivated stays deactivated.
pub async fn seed_default_key(store: &dyn ApiKeyStore, key: &str) -> Result<bool> {
    if store.exists(key).await? {
        return Ok(false);
    }
    store.insert(key).await?;
    info!("Seeded default API key");
    Ok(true)
}

/// Generates a fresh API key: 32 random bytes, base58-encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bs58::encode(bytes).into_string()
}

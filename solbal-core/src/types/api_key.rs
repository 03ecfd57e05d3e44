//! Stored API keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An API key as persisted by a key store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    /// The key presented in the `x-api-key` header
    pub key: String,
    /// Inactive keys are rejected
    pub active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Creates an active key stamped with the current time.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

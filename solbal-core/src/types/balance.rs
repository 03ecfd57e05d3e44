//! Balance values and batch results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, LookupError};

/// Account balance in lamports.
///
/// Opaque to the cache: it is stored and returned, never compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    /// Wraps a raw lamport amount.
    pub const fn new(lamports: u64) -> Self {
        Self(lamports)
    }

    /// Returns the raw lamport amount.
    pub const fn lamports(self) -> u64 {
        self.0
    }
}

impl From<u64> for Balance {
    fn from(lamports: u64) -> Self {
        Self(lamports)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one key inside a batch lookup.
///
/// Exactly one of `value` (when `present`) or `error` is meaningful; a failed
/// item carries a zero balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchItem {
    /// The key as supplied by the caller.
    pub key: String,
    /// Resolved balance, zero on failure.
    pub value: Balance,
    /// Whether `value` holds a resolved balance.
    pub present: bool,
    /// Failure of this key, if any.
    pub error: Option<LookupError>,
}

impl BatchItem {
    /// Builds an item from a single lookup outcome.
    pub fn from_result(key: impl Into<String>, result: Result<Balance, LookupError>) -> Self {
        let key = key.into();
        match result {
            Ok(value) => Self {
                key,
                value,
                present: true,
                error: None,
            },
            Err(error) => Self {
                key,
                value: Balance::default(),
                present: false,
                error: Some(error),
            },
        }
    }

    /// Returns the error category, if this item failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(LookupError::kind)
    }

    /// Returns true if the item resolved.
    pub fn is_ok(&self) -> bool {
        self.present
    }
}

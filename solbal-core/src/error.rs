//! Error types for solbal.
//!
//! [`SolbalError`] is the workspace-wide error hierarchy built with `thiserror`.
//! [`LookupError`] is the narrow, cloneable per-key error that the cache hands
//! to every caller waiting on the same lookup.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using `SolbalError`.
pub type Result<T> = std::result::Result<T, SolbalError>;

/// Main error type for all solbal operations.
#[derive(Debug, Error)]
pub enum SolbalError {
    // ═══════════════════════════════════════════════════════════════════════════
    // ADDRESS ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Wallet address is not a valid base58 public key.
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Connection timeout.
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    /// RPC call failed.
    #[error("RPC call failed: {0}")]
    RpcError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// API key store failure.
    #[error("Key store error: {0}")]
    KeyStoreError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SolbalError {
    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SolbalError::HttpError(_) | SolbalError::ConnectionTimeout(_) | SolbalError::RpcError(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            SolbalError::ValidationError(_) | SolbalError::InvalidAddress(_)
        )
    }
}

/// Category of a failed single-key lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed key; never reached the upstream.
    InvalidKey,
    /// The resolver returned an error.
    UpstreamFailure,
    /// The deadline passed while waiting for the lookup.
    Timeout,
}

/// Failure of one key inside a lookup.
///
/// Cloneable so a single upstream outcome can be delivered to every caller
/// that was waiting on the same key.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    /// Malformed key.
    #[error("invalid wallet address: {0}")]
    InvalidKey(String),

    /// Upstream lookup failed.
    #[error("upstream lookup failed: {0}")]
    UpstreamFailure(String),

    /// Deadline exceeded.
    #[error("lookup timed out")]
    Timeout,
}

impl LookupError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LookupError::InvalidKey(_) => ErrorKind::InvalidKey,
            LookupError::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            LookupError::Timeout => ErrorKind::Timeout,
        }
    }
}

impl From<SolbalError> for LookupError {
    fn from(err: SolbalError) -> Self {
        match err {
            SolbalError::InvalidAddress(reason) | SolbalError::ValidationError(reason) => {
                LookupError::InvalidKey(reason)
            }
            SolbalError::ConnectionTimeout(_) => LookupError::Timeout,
            other => LookupError::UpstreamFailure(other.to_string()),
        }
    }
}

//! DTOs for API requests and responses.

use serde::{Deserialize, Serialize};
use solbal_core::types::BatchItem;

/// Request body of `POST /api/get-balance`.
#[derive(Debug, Deserialize)]
pub struct GetBalanceRequest {
    /// Base58 wallet addresses, resolved in order
    pub wallets: Vec<String>,
}

/// Response body of `POST /api/get-balance`.
#[derive(Debug, Serialize)]
pub struct GetBalanceResponse {
    /// One entry per requested wallet, in request order
    pub balances: Vec<BalanceEntry>,
}

/// Balance of one wallet, or the reason it could not be fetched.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BalanceEntry {
    /// Wallet address as requested
    pub wallet: String,
    /// Lamports (0 on error)
    pub balance: u64,
    /// Error message when the lookup failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BatchItem> for BalanceEntry {
    fn from(item: BatchItem) -> Self {
        Self {
            balance: item.value.lamports(),
            error: item.error.map(|e| e.to_string()),
            wallet: item.key,
        }
    }
}

/// Response for health check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Balances currently cached
    pub cache_entries: usize,
    /// Upstream lookups currently running
    pub in_flight: usize,
}

/// Response of `POST /api/alert/test`.
#[derive(Debug, Serialize)]
pub struct AlertTestResponse {
    /// True once the alert was handed to the sink
    pub sent: bool,
}

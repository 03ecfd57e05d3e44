//! Solana JSON-RPC client.
//!
//! Issues `getBalance` against a single RPC endpoint and maps node and
//! transport failures onto [`SolbalError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use solbal_core::constants::DEFAULT_COMMITMENT;
use solbal_core::error::{Result, SolbalError};
use solbal_core::{Balance, BalanceResolver};

use crate::address::validate_address;

/// Default request timeout in seconds.
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// RPC client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Solana RPC URL
    pub rpc_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Commitment level passed with every query
    pub commitment: String,
}

impl RpcConfig {
    /// Creates a new configuration with the given RPC URL.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            timeout_seconds: DEFAULT_RPC_TIMEOUT_SECS,
            commitment: DEFAULT_COMMITMENT.into(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Sets the commitment level.
    pub fn with_commitment(mut self, commitment: impl Into<String>) -> Self {
        self.commitment = commitment.into();
        self
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Serialize)]
struct CommitmentParam<'a> {
    commitment: &'a str,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ContextValue<T> {
    value: T,
}

/// Solana RPC client implementing [`BalanceResolver`].
pub struct SolanaRpcClient {
    config: RpcConfig,
    http_client: reqwest::Client,
}

impl SolanaRpcClient {
    /// Creates a new client with default configuration.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        Self::with_config(RpcConfig::new(rpc_url))
    }

    /// Creates a new client with custom configuration.
    pub fn with_config(config: RpcConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SolbalError::HttpError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Fetches the lamport balance of `address`.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, address: &str) -> Result<u64> {
        validate_address(address)?;

        let params = (
            address,
            CommitmentParam {
                commitment: &self.config.commitment,
            },
        );
        let balance: ContextValue<u64> = self.call("getBalance", params).await?;

        debug!(address, lamports = balance.value, "Fetched balance");
        Ok(balance.value)
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T>
    where
        P: Serialize,
        T: for<'de> Deserialize<'de>,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http_client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        let parsed: RpcResponse<T> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(SolbalError::HttpError(format!("{method} returned HTTP {status}")));
            }
            Err(e) => {
                return Err(SolbalError::RpcError(format!("malformed {method} response: {e}")));
            }
        };

        if let Some(error) = parsed.error {
            warn!(method, code = error.code, message = %error.message, "RPC error");
            return Err(SolbalError::RpcError(format!("{}: {}", error.code, error.message)));
        }

        parsed
            .result
            .ok_or_else(|| SolbalError::RpcError(format!("{method} response has no result")))
    }
}

fn transport_error(e: reqwest::Error) -> SolbalError {
    if e.is_timeout() {
        SolbalError::ConnectionTimeout(e.to_string())
    } else {
        SolbalError::HttpError(e.to_string())
    }
}

#[async_trait]
impl BalanceResolver for SolanaRpcClient {
    async fn resolve(&self, key: &str) -> Result<Balance> {
        self.get_balance(key).await.map(Balance::new)
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        validate_address(key)
    }
}

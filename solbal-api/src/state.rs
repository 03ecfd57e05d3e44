//! App state: cache, batch orchestrator, key store, alert sink, config.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use solbal_cache::{BalanceCache, BatchConfig, BatchLookup, CacheConfig};
use solbal_core::constants::{
    DEFAULT_KEY_CHECK_TIMEOUT_SECS, DEFAULT_LOOKUP_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_RATE_LIMIT_PER_MINUTE,
};
use solbal_core::error::{Result, SolbalError};
use solbal_core::traits::{AlertSink, ApiKeyStore, BalanceResolver};
use solbal_keys::{seed_default_key, FileKeyStore, MemoryKeyStore};
use solbal_rpc::{RpcConfig, SolanaRpcClient};

use crate::alert::{DiscordAlertSink, LogAlertSink};
use crate::middleware::ClientRateLimiter;

/// Server configuration, usually read from the environment.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Solana RPC endpoint (`SOLANA_RPC_URL`)
    pub rpc_url: String,
    /// Listen port (`PORT`)
    pub port: u16,
    /// Key seeded into the store at boot (`DEFAULT_API_KEY`)
    pub default_api_key: Option<String>,
    /// JSON key file; memory store when unset (`API_KEYS_FILE`)
    pub api_keys_file: Option<PathBuf>,
    /// Discord webhook; log-only alerts when unset (`DISCORD_WEBHOOK_URL`)
    pub discord_webhook_url: Option<String>,
    /// Cache TTL and sweeper
    pub cache: CacheConfig,
    /// Batch parallelism
    pub batch: BatchConfig,
    /// Deadline for one `get-balance` request
    pub lookup_timeout_seconds: u64,
    /// Requests per minute per client IP, 0 disables limiting
    pub rate_limit_per_minute: u32,
    /// Deadline for one API key check
    pub key_check_timeout_seconds: u64,
}

impl ApiConfig {
    /// Configuration with defaults for everything but the RPC URL.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            port: DEFAULT_PORT,
            default_api_key: None,
            api_keys_file: None,
            discord_webhook_url: None,
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            lookup_timeout_seconds: DEFAULT_LOOKUP_TIMEOUT_SECS,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            key_check_timeout_seconds: DEFAULT_KEY_CHECK_TIMEOUT_SECS,
        }
    }

    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            info!(reason = %e, "No .env file loaded, using process environment");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let rpc_url = get("SOLANA_RPC_URL")
            .ok_or_else(|| SolbalError::ConfigError("SOLANA_RPC_URL not set".into()))?;
        check_url("SOLANA_RPC_URL", &rpc_url)?;

        let discord_webhook_url = get("DISCORD_WEBHOOK_URL");
        if let Some(webhook) = &discord_webhook_url {
            check_url("DISCORD_WEBHOOK_URL", webhook)?;
        }

        let defaults = Self::new(rpc_url);
        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            default_api_key: get("DEFAULT_API_KEY"),
            api_keys_file: get("API_KEYS_FILE").map(PathBuf::from),
            discord_webhook_url,
            cache: CacheConfig {
                ttl_seconds: parse_or(&get, "CACHE_TTL_SECS", defaults.cache.ttl_seconds)?,
                sweep_interval_seconds: parse_or(
                    &get,
                    "CACHE_SWEEP_SECS",
                    defaults.cache.sweep_interval_seconds,
                )?,
            },
            batch: BatchConfig {
                max_concurrency: parse_or(
                    &get,
                    "BATCH_CONCURRENCY",
                    defaults.batch.max_concurrency,
                )?,
            },
            lookup_timeout_seconds: parse_or(
                &get,
                "LOOKUP_TIMEOUT_SECS",
                defaults.lookup_timeout_seconds,
            )?,
            rate_limit_per_minute: parse_or(
                &get,
                "RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            )?,
            key_check_timeout_seconds: parse_or(
                &get,
                "KEY_CHECK_TIMEOUT_SECS",
                defaults.key_check_timeout_seconds,
            )?,
            ..defaults
        })
    }

    /// Deadline for one `get-balance` request.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_seconds)
    }

    /// Deadline for one API key check.
    pub fn key_check_timeout(&self) -> Duration {
        Duration::from_secs(self.key_check_timeout_seconds)
    }
}

fn check_url(name: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| SolbalError::ConfigError(format!("{name}={raw:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SolbalError::ConfigError(format!(
            "{name}: unsupported scheme {other:?}"
        ))),
    }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SolbalError::ConfigError(format!("{name}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

/// Shared handler state.
pub struct AppState {
    /// Configuration the state was built from
    pub config: ApiConfig,
    /// Shared balance cache
    pub cache: Arc<BalanceCache>,
    /// Batch orchestrator over `cache`
    pub batch: BatchLookup,
    /// API key store used by the auth middleware
    pub keys: Arc<dyn ApiKeyStore>,
    /// Operator alert sink
    pub alerts: Arc<dyn AlertSink>,
    /// Per-client request limiter
    pub rate_limiter: ClientRateLimiter,
    started_at: Instant,
}

impl AppState {
    /// Wires the state from already-built collaborators.
    pub fn new(
        config: ApiConfig,
        resolver: Arc<dyn BalanceResolver>,
        keys: Arc<dyn ApiKeyStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let cache = Arc::new(BalanceCache::with_config(resolver, config.cache.clone()));
        let batch = BatchLookup::with_config(cache.clone(), config.batch.clone());
        let rate_limiter = ClientRateLimiter::new(config.rate_limit_per_minute);

        Self {
            config,
            cache,
            batch,
            keys,
            alerts,
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    /// Builds the production state: Solana RPC upstream, configured key store
    /// (seeded with the default key) and alert sink.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        let resolver = Arc::new(SolanaRpcClient::with_config(RpcConfig::new(&config.rpc_url))?);

        let keys: Arc<dyn ApiKeyStore> = match &config.api_keys_file {
            Some(path) => Arc::new(FileKeyStore::open(path).await?),
            None => Arc::new(MemoryKeyStore::new()),
        };
        if let Some(key) = &config.default_api_key {
            seed_default_key(keys.as_ref(), key).await?;
        }
        debug!(keys = keys.count().await?, "Key store ready");

        let alerts: Arc<dyn AlertSink> = match &config.discord_webhook_url {
            Some(url) => Arc::new(DiscordAlertSink::new(url)?),
            None => Arc::new(LogAlertSink),
        };

        Ok(Self::new(config, resolver, keys, alerts))
    }

    /// Seconds since the state was built.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[("SOLANA_RPC_URL", "http://rpc")])).unwrap();
        assert_eq!(config.rpc_url, "http://rpc");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache.ttl_seconds, 10);
        assert_eq!(config.cache.sweep_interval_seconds, 20);
        assert_eq!(config.batch.max_concurrency, 16);
        assert_eq!(config.lookup_timeout(), Duration::from_secs(5));
        assert_eq!(config.rate_limit_per_minute, 10);
        assert_eq!(config.key_check_timeout(), Duration::from_secs(2));
        assert!(config.default_api_key.is_none());
        assert!(config.api_keys_file.is_none());
        assert!(config.discord_webhook_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("SOLANA_RPC_URL", "http://rpc"),
            ("PORT", "9000"),
            ("DEFAULT_API_KEY", "dev"),
            ("API_KEYS_FILE", "/tmp/keys.json"),
            ("CACHE_TTL_SECS", "30"),
            ("CACHE_SWEEP_SECS", "0"),
            ("BATCH_CONCURRENCY", "4"),
            ("RATE_LIMIT_PER_MINUTE", "60"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.default_api_key.as_deref(), Some("dev"));
        assert_eq!(config.api_keys_file, Some(PathBuf::from("/tmp/keys.json")));
        assert_eq!(config.cache.ttl_seconds, 30);
        assert!(config.cache.sweep_interval().is_none());
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.rate_limit_per_minute, 60);
    }

    #[test]
    fn test_missing_rpc_url() {
        let err = ApiConfig::from_lookup(lookup(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, SolbalError::ConfigError(_)));

        let err = ApiConfig::from_lookup(lookup(&[("SOLANA_RPC_URL", "  ")])).unwrap_err();
        assert!(matches!(err, SolbalError::ConfigError(_)));
    }

    #[test]
    fn test_malformed_number() {
        let err = ApiConfig::from_lookup(lookup(&[
            ("SOLANA_RPC_URL", "http://rpc"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_urls_checked() {
        let err = ApiConfig::from_lookup(lookup(&[("SOLANA_RPC_URL", "not a url")])).unwrap_err();
        assert!(err.to_string().contains("SOLANA_RPC_URL"));

        let err = ApiConfig::from_lookup(lookup(&[
            ("SOLANA_RPC_URL", "http://rpc"),
            ("DISCORD_WEBHOOK_URL", "ftp://hooks"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DISCORD_WEBHOOK_URL"));
    }

    #[tokio::test]
    async fn test_from_config_seeds_default_key() {
        let mut config = ApiConfig::new("http://127.0.0.1:1");
        config.default_api_key = Some("dev".into());

        let state = AppState::from_config(config).await.unwrap();
        assert!(state.keys.is_active("dev").await.unwrap());
        assert!(state.cache.is_empty());
    }
}

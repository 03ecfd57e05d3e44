//! Read-through TTL cache with per-key single-flight resolution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use solbal_core::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS};
use solbal_core::{instant_after, Balance, BalanceResolver, LookupContext, LookupError, SolbalError};

use crate::flight::{FlightLease, FlightTable, Outcome, OutcomeReceiver, Role};

/// Cache entry with an absolute expiry.
#[derive(Clone, Copy)]
struct CacheEntry {
    value: Balance,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a resolved balance is served, in seconds
    pub ttl_seconds: u64,
    /// Interval of the background sweeper in seconds (0 disables it)
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// Entry time-to-live.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Sweeper interval, `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    upstream_calls: AtomicU64,
    upstream_failures: AtomicU64,
    timeouts: AtomicU64,
    coalesced: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Balance cache that collapses concurrent misses on a key into one upstream
/// call.
///
/// Fresh entries are served from a sharded map without touching the flight
/// table. A miss joins the key's flight: the first caller resolves through the
/// [`BalanceResolver`] while the others wait for its outcome. Failures are
/// shared with the callers already waiting but never cached.
pub struct BalanceCache {
    entries: DashMap<String, CacheEntry>,
    flights: FlightTable,
    resolver: Arc<dyn BalanceResolver>,
    config: CacheConfig,
    counters: Counters,
}

impl BalanceCache {
    /// Creates a cache with default configuration.
    pub fn new(resolver: Arc<dyn BalanceResolver>) -> Self {
        Self::with_config(resolver, CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(resolver: Arc<dyn BalanceResolver>, config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            flights: FlightTable::new(),
            resolver,
            config,
            counters: Counters::default(),
        }
    }

    /// Returns the balance for `key`, resolving it upstream on a miss.
    ///
    /// Fails with [`LookupError::Timeout`] if `ctx`'s deadline passes while
    /// waiting for another caller's lookup or for our own upstream call.
    pub async fn get(&self, ctx: &LookupContext, key: &str) -> Result<Balance, LookupError> {
        self.resolver.validate_key(key).map_err(invalid_key)?;

        if let Some(value) = self.peek(key) {
            Counters::bump(&self.counters.hits);
            debug!(key, "Cache hit");
            return Ok(value);
        }
        Counters::bump(&self.counters.misses);

        match self.flights.join(key) {
            Role::Leader(lease) => self.lead(ctx, key, lease).await,
            Role::Follower(rx) => self.follow(ctx, key, rx).await,
        }
    }

    async fn lead(&self, ctx: &LookupContext, key: &str, lease: FlightLease<'_>) -> Outcome {
        // Another leader may have stored the key between our miss and our join.
        if let Some(value) = self.peek(key) {
            debug!(key, "Cache filled while joining, skipping upstream");
            lease.publish(Ok(value));
            return Ok(value);
        }

        debug!(key, "Cache miss, resolving upstream");
        Counters::bump(&self.counters.upstream_calls);

        let outcome = match tokio::time::timeout_at(ctx.deadline(), self.resolver.resolve(key)).await {
            Ok(Ok(value)) => {
                self.store(key, value);
                info!(key, lamports = value.lamports(), "Resolved balance");
                Ok(value)
            }
            Ok(Err(err)) => {
                Counters::bump(&self.counters.upstream_failures);
                warn!(key, error = %err, "Upstream lookup failed");
                Err(LookupError::from(err))
            }
            Err(_) => {
                Counters::bump(&self.counters.timeouts);
                warn!(key, "Upstream lookup timed out");
                Err(LookupError::Timeout)
            }
        };

        lease.publish(outcome.clone());
        outcome
    }

    async fn follow(&self, ctx: &LookupContext, key: &str, mut rx: OutcomeReceiver) -> Outcome {
        Counters::bump(&self.counters.coalesced);
        debug!(key, "Joining in-flight lookup");

        let waited = tokio::time::timeout_at(ctx.deadline(), rx.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(published)) => match &*published {
                Some(outcome) => outcome.clone(),
                None => Err(abandoned()),
            },
            Ok(Err(_)) => {
                warn!(key, "In-flight lookup abandoned by its leader");
                Err(abandoned())
            }
            Err(_) => {
                Counters::bump(&self.counters.timeouts);
                debug!(key, "Timed out waiting for in-flight lookup");
                Err(LookupError::Timeout)
            }
        }
    }

    /// Returns the cached balance if present and fresh, without resolving.
    pub fn peek(&self, key: &str) -> Option<Balance> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    fn store(&self, key: &str, value: Balance) {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                value,
                expires_at: instant_after(self.config.ttl()),
            },
        );
    }

    /// Removes a cached entry.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of keys currently being resolved.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.is_expired(now))
            .count();

        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total.saturating_sub(expired),
            in_flight: self.in_flight(),
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            upstream_calls: load(&self.counters.upstream_calls),
            upstream_failures: load(&self.counters.upstream_failures),
            timeouts: load(&self.counters.timeouts),
            coalesced: load(&self.counters.coalesced),
        }
    }

    /// Spawns a task that purges expired entries every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired balances");
                }
            }
        })
    }
}

fn invalid_key(err: SolbalError) -> LookupError {
    match err {
        SolbalError::InvalidAddress(reason) | SolbalError::ValidationError(reason) => {
            LookupError::InvalidKey(reason)
        }
        other => LookupError::InvalidKey(other.to_string()),
    }
}

fn abandoned() -> LookupError {
    LookupError::UpstreamFailure("lookup abandoned".into())
}

/// Cache statistics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub timeouts: u64,
    pub coalesced: u64,
}

//! Service constants for solbal.
//!
//! A balance is served from cache for ten seconds and a client may make ten
//! requests per minute.

// ═══════════════════════════════════════════════════════════════════════════════
// SOLANA
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a decoded Solana public key in bytes.
pub const SOLANA_PUBKEY_SIZE: usize = 32;

/// Longest base58 rendering of a 32-byte key.
pub const MAX_ADDRESS_LEN: usize = 44;

/// Commitment level used for balance queries.
pub const DEFAULT_COMMITMENT: &str = "finalized";

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// How long a resolved balance is served from cache.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;

/// Interval of the background sweeper that drops dead entries.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 20;

/// Deadline applied to one batch lookup request.
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Maximum number of keys of one batch resolved in parallel.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// API
// ═══════════════════════════════════════════════════════════════════════════════

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Requests per minute allowed per client.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 10;

/// Deadline for an API key store lookup.
pub const DEFAULT_KEY_CHECK_TIMEOUT_SECS: u64 = 2;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Discord rejects message bodies above 2000 characters.
pub const MAX_ALERT_LEN: usize = 1900;

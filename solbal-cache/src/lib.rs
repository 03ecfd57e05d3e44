//! # solbal Cache
//!
//! Read-through balance cache with single-flight resolution.
//!
//! - [`BalanceCache`]: TTL cache that collapses concurrent misses on the same
//!   key into one upstream call
//! - [`BatchLookup`]: resolves an ordered list of keys through the cache with
//!   per-item error isolation
//!
//! ## Example
//!
//! ```rust,ignore
//! use solbal_cache::{BalanceCache, BatchLookup};
//! use solbal_core::LookupContext;
//!
//! let cache = Arc::new(BalanceCache::new(resolver));
//! let batch = BatchLookup::new(cache);
//! let ctx = LookupContext::with_timeout(Duration::from_secs(5));
//! let items = batch.resolve_all(&ctx, &["A", "B", "C"]).await;
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

mod batch;
mod cache;
mod flight;

#[cfg(test)]
mod test_support;

pub use batch::{BatchConfig, BatchLookup};
pub use cache::{BalanceCache, CacheConfig, CacheStats};

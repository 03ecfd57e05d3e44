//! Ordered batch lookups over the balance cache.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use solbal_core::constants::DEFAULT_BATCH_CONCURRENCY;
use solbal_core::{BatchItem, LookupContext};

use crate::cache::BalanceCache;

/// Batch configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of keys resolved at the same time
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// Resolves a list of keys through a shared [`BalanceCache`].
///
/// Results come back in input order. A failing key yields a failed
/// [`BatchItem`] and never disturbs its siblings. Duplicate keys are looked
/// up independently and share one upstream call through the cache.
#[derive(Clone)]
pub struct BatchLookup {
    cache: Arc<BalanceCache>,
    config: BatchConfig,
}

impl BatchLookup {
    /// Creates an orchestrator with default configuration.
    pub fn new(cache: Arc<BalanceCache>) -> Self {
        Self::with_config(cache, BatchConfig::default())
    }

    /// Creates an orchestrator with custom configuration.
    pub fn with_config(cache: Arc<BalanceCache>, config: BatchConfig) -> Self {
        Self { cache, config }
    }

    /// Returns the underlying cache.
    pub fn cache(&self) -> &Arc<BalanceCache> {
        &self.cache
    }

    /// Resolves every key under one deadline.
    pub async fn resolve_all<S>(&self, ctx: &LookupContext, keys: &[S]) -> Vec<BatchItem>
    where
        S: AsRef<str>,
    {
        let limit = self.config.max_concurrency.max(1);
        debug!(count = keys.len(), limit, "Resolving batch");

        // Build the (lazy) futures eagerly so the mapping closure is not held
        // across an await point; keeps the returned future `Send` for callers.
        let lookups: Vec<_> = keys
            .iter()
            .map(|key| async move {
                let key = key.as_ref();
                BatchItem::from_result(key, self.cache.get(ctx, key).await)
            })
            .collect();
        stream::iter(lookups)
            .buffered(limit)
            .collect()
            .await
    }
}

//! Scripted resolver shared by the cache and batch tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use solbal_core::{Balance, BalanceResolver, Result, SolbalError};

/// Resolver with a fixed latency that counts its calls.
///
/// Keys starting with `!` are malformed; keys in the failing set return an
/// RPC error; everything else resolves to its configured value (42 by default).
pub(crate) struct ScriptedResolver {
    delay: Duration,
    values: Mutex<HashMap<String, u64>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedResolver {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            values: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_value(self, key: &str, lamports: u64) -> Self {
        self.values.lock().insert(key.to_owned(), lamports);
        self
    }

    pub(crate) fn set_failing(&self, key: &str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(key.to_owned());
        } else {
            set.remove(key);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl BalanceResolver for ScriptedResolver {
    async fn resolve(&self, key: &str) -> Result<Balance> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(key.to_owned()).or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.lock().contains(key) {
            return Err(SolbalError::RpcError(format!("node refused {key}")));
        }
        let lamports = self.values.lock().get(key).copied().unwrap_or(42);
        Ok(Balance::new(lamports))
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        if key.starts_with('!') {
            return Err(SolbalError::InvalidAddress(key.to_owned()));
        }
        Ok(())
    }
}

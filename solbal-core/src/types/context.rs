//! Deadline propagation for lookups.

use std::time::Duration;

use tokio::time::Instant;

/// Roughly thirty years, used where an offset would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `duration` from now.
///
/// Offsets too large for the clock saturate to a far-future instant.
pub fn instant_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Deadline carried from the request layer into the cache.
///
/// Uses tokio's clock so paused-time tests see the same instants as the
/// cache.
#[derive(Clone, Copy, Debug)]
pub struct LookupContext {
    deadline: Instant,
}

impl LookupContext {
    /// Context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: instant_after(timeout),
        }
    }

    /// The instant after which the lookup fails with a timeout.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns true once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_context_expires() {
        let ctx = LookupContext::with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(ctx.remaining(), Duration::from_secs(2));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_saturates() {
        let ctx = LookupContext::with_timeout(Duration::from_secs(u64::MAX));
        assert!(!ctx.is_expired());
        assert_eq!(ctx.remaining(), FAR_FUTURE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_after_small_offset_is_exact() {
        let now = Instant::now();
        assert_eq!(instant_after(Duration::from_secs(10)), now + Duration::from_secs(10));
    }
}

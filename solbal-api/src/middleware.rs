//! Request guards: API key authentication and per-client rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use solbal_core::constants::API_KEY_HEADER;

use crate::error::ApiError;
use crate::state::AppState;

// ═══════════════════════════════════════════════════════════════════════════
// API KEY AUTHENTICATION
// ═══════════════════════════════════════════════════════════════════════════

/// Rejects requests without an active `x-api-key`.
///
/// A key store that errors or does not answer within the configured
/// deadline is treated as a rejection.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
        .map(str::to_owned);

    let Some(key) = key else {
        return Err(ApiError::unauthorized());
    };

    let check = tokio::time::timeout(state.config.key_check_timeout(), state.keys.is_active(&key));
    match check.await {
        Ok(Ok(true)) => Ok(next.run(request).await),
        Ok(Ok(false)) => {
            debug!("Rejected unknown or inactive API key");
            Err(ApiError::unauthorized())
        }
        Ok(Err(e)) => {
            warn!(error = %e, "API key check failed");
            Err(ApiError::unauthorized())
        }
        Err(_) => {
            warn!("API key check timed out");
            Err(ApiError::unauthorized())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RATE LIMITING
// ═══════════════════════════════════════════════════════════════════════════

/// Per-client request quota, keyed by IP address.
pub struct ClientRateLimiter {
    limiter: Option<DefaultKeyedRateLimiter<IpAddr>>,
}

impl ClientRateLimiter {
    /// Allows `per_minute` requests per client; zero disables limiting.
    pub fn new(per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(per_minute).map(|n| RateLimiter::keyed(Quota::per_minute(n)));
        Self { limiter }
    }

    /// Admits one request from `ip`, or returns seconds until it would be.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter.check_key(&ip).map_err(|not_until| {
            not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1)
        })
    }

    /// Drops state for clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |l| l.len())
    }
}

/// Extracts the client IP, preferring proxy headers over the peer address.
pub(crate) fn client_ip(request: &Request) -> IpAddr {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned)
    };

    // X-Forwarded-For can contain multiple IPs, take the first one
    if let Some(ip) = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().and_then(|first| first.trim().parse().ok()))
    {
        return ip;
    }

    if let Some(ip) = header("x-real-ip").and_then(|v| v.trim().parse().ok()) {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Enforces the per-client quota; over quota → 429 with `retry-after`.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request);

    match state.rate_limiter.check(ip) {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => {
            debug!(%ip, retry_after, "Rate limit exceeded");
            Err(ApiError::too_many_requests(retry_after))
        }
    }
}

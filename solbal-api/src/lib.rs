//! # solbal API Server
//!
//! HTTP front end for the single-flight balance cache.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness and cache size (no key required)
//! - `POST /api/get-balance` - Balances for a list of wallets
//! - `GET /api/cache/stats` - Cache counters
//! - `POST /api/alert/test` - Sends a test alert
//!
//! Everything under `/api` needs an `x-api-key` header and is rate limited
//! per client IP.
//!
//! ## Example
//!
//! ```rust,ignore
//! use solbal_api::{ApiConfig, ApiServer, AppState};
//!
//! let config = ApiConfig::from_env()?;
//! let state = AppState::from_config(config).await?;
//! ApiServer::new(state).run(([0, 0, 0, 0], 8080)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod alert;
mod dto;
mod error;
mod handlers;
mod middleware;
mod routes;
mod state;

pub use alert::{DiscordAlertSink, LogAlertSink, PanicAlerter};
pub use error::ApiError;
pub use middleware::ClientRateLimiter;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tracing::info;

/// How often idle rate-limit entries are dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// API server for the balance cache.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server around `state`.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Runs the server on the given address until Ctrl-C.
    ///
    /// Starts the cache sweeper and rate-limit cleanup for the lifetime of
    /// the server.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let sweeper = self
            .state
            .config
            .cache
            .sweep_interval()
            .map(|interval| self.state.cache.spawn_sweeper(interval));

        let state = self.state.clone();
        let cleanup = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                state.rate_limiter.retain_recent();
            }
        });

        info!("solbal API server listening on {}", addr);

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        cleanup.abort();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        info!("solbal API server stopped");
        result
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

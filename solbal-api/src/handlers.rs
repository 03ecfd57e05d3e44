//! API route handlers.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{debug, info};

use solbal_cache::CacheStats;
use solbal_core::types::LookupContext;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Message returned for every malformed `get-balance` body.
const INVALID_BODY: &str = "Invalid request body";

/// POST /api/get-balance
///
/// Resolves every wallet under one deadline. Per-wallet failures are
/// reported inline; the request itself still succeeds.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<GetBalanceRequest>, JsonRejection>,
) -> Result<Json<GetBalanceResponse>> {
    let Json(req) = body.map_err(|rejection| {
        debug!(reason = %rejection, "Rejected get-balance body");
        ApiError::bad_request(INVALID_BODY)
    })?;
    if req.wallets.is_empty() {
        return Err(ApiError::bad_request(INVALID_BODY));
    }

    let ctx = LookupContext::with_timeout(state.config.lookup_timeout());
    let items = state.batch.resolve_all(&ctx, &req.wallets).await;

    let failed = items.iter().filter(|item| !item.is_ok()).count();
    info!(wallets = items.len(), failed, "Resolved balances");

    Ok(Json(GetBalanceResponse {
        balances: items.into_iter().map(BalanceEntry::from).collect(),
    }))
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// POST /api/alert/test
pub async fn alert_test(State(state): State<Arc<AppState>>) -> Json<AlertTestResponse> {
    state
        .alerts
        .notify("🔔 Test alert from solbal balance service".to_string());
    info!("Test alert sent");
    Json(AlertTestResponse { sent: true })
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.uptime_seconds(),
        cache_entries: state.cache.len(),
        in_flight: state.cache.in_flight(),
    })
}

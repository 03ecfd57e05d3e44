//! API route configuration.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::alert::PanicAlerter;
use crate::handlers;
use crate::middleware::{rate_limit, require_api_key};
use crate::state::AppState;

/// Creates the API router with all routes and layers configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/get-balance", post(handlers::get_balance))
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/alert/test", post(handlers::alert_test))
        // Layers run bottom-up: rate limit first, then authentication
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .merge(api)
        .with_state(state.clone())
        .layer(CatchPanicLayer::custom(PanicAlerter::new(state.alerts.clone())))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use solbal_core::error::{Result, SolbalError};
    use solbal_core::traits::{AlertSink, ApiKeyStore, BalanceResolver};
    use solbal_core::Balance;
    use solbal_keys::MemoryKeyStore;
    use solbal_rpc::{validate_address, RpcConfig, SolanaRpcClient};

    use crate::state::ApiConfig;

    const KEY: &str = "test-key";
    const WALLET_A: &str = "So11111111111111111111111111111111111111112";
    const WALLET_B: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
    const WALLET_DOWN: &str = "11111111111111111111111111111111";

    /// Resolver with fixed balances; `WALLET_DOWN` always fails.
    struct StubResolver {
        delay: Duration,
    }

    #[async_trait]
    impl BalanceResolver for StubResolver {
        async fn resolve(&self, key: &str) -> Result<Balance> {
            tokio::time::sleep(self.delay).await;
            match key {
                WALLET_A => Ok(Balance::new(1_500_000_000)),
                WALLET_DOWN => Err(SolbalError::RpcError("-32005: Node is behind".into())),
                _ => Ok(Balance::new(7)),
            }
        }

        fn validate_key(&self, key: &str) -> Result<()> {
            validate_address(key)
        }
    }

    #[derive(Default)]
    struct RecordingAlerts {
        messages: Mutex<Vec<String>>,
    }

    impl AlertSink for RecordingAlerts {
        fn notify(&self, message: String) {
            self.messages.lock().push(message);
        }
    }

    struct Harness {
        state: Arc<AppState>,
        alerts: Arc<RecordingAlerts>,
    }

    impl Harness {
        async fn with_config(config: ApiConfig, resolver: Arc<dyn BalanceResolver>) -> Self {
            let keys = Arc::new(MemoryKeyStore::new());
            keys.insert(KEY).await.unwrap();
            let alerts = Arc::new(RecordingAlerts::default());
            let state = Arc::new(AppState::new(config, resolver, keys, alerts.clone()));
            Self { state, alerts }
        }

        async fn new() -> Self {
            let resolver = Arc::new(StubResolver {
                delay: Duration::from_millis(10),
            });
            Self::with_config(ApiConfig::new("http://unused"), resolver).await
        }

        async fn send(&self, request: Request<Body>) -> Response {
            create_router(self.state.clone()).oneshot(request).await.unwrap()
        }
    }

    fn post_json(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with_key(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-api-key", KEY)
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let harness = Harness::new().await;

        let response = harness
            .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache_entries"], 0);
        assert_eq!(body["in_flight"], 0);
    }

    #[tokio::test]
    async fn test_get_balance_mixed_results() {
        let harness = Harness::new().await;

        let response = harness
            .send(post_json(
                "/api/get-balance",
                Some(KEY),
                json!({"wallets": [WALLET_A, "not-a-wallet", WALLET_DOWN, WALLET_B]}),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let balances = body["balances"].as_array().unwrap();
        assert_eq!(balances.len(), 4);

        assert_eq!(balances[0], json!({"wallet": WALLET_A, "balance": 1_500_000_000u64}));
        assert_eq!(balances[1]["wallet"], "not-a-wallet");
        assert_eq!(balances[1]["balance"], 0);
        assert!(balances[1]["error"].as_str().unwrap().contains("invalid wallet address"));
        assert_eq!(balances[2]["balance"], 0);
        assert!(balances[2]["error"].as_str().unwrap().contains("Node is behind"));
        assert_eq!(balances[3], json!({"wallet": WALLET_B, "balance": 7}));

        // Only successful lookups are cached
        assert_eq!(harness.state.cache.len(), 2);
    }

    #[tokio::test]
    async fn test_get_balance_invalid_bodies() {
        let harness = Harness::new().await;

        for body in [json!({"wallets": []}), json!({"wallet": [WALLET_A]}), json!([1, 2])] {
            let response = harness.send(post_json("/api/get-balance", Some(KEY), body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await, json!({"error": "Invalid request body"}));
        }

        let raw = Request::builder()
            .method("POST")
            .uri("/api/get-balance")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", KEY)
            .body(Body::from("{not json"))
            .unwrap();
        assert_eq!(harness.send(raw).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auth_required() {
        let harness = Harness::new().await;
        let body = json!({"wallets": [WALLET_A]});

        for key in [None, Some(""), Some("wrong")] {
            let response = harness
                .send(post_json("/api/get-balance", key, body.clone()))
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                json_body(response).await,
                json!({"error": "Invalid or missing API key"})
            );
        }
    }

    #[tokio::test]
    async fn test_deactivated_key_rejected() {
        let harness = Harness::new().await;
        harness.state.keys.deactivate(KEY).await.unwrap();

        let response = harness.send(get_with_key("/api/cache/stats")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let mut config = ApiConfig::new("http://unused");
        config.rate_limit_per_minute = 2;
        let resolver = Arc::new(StubResolver {
            delay: Duration::ZERO,
        });
        let harness = Harness::with_config(config, resolver).await;

        let from = |ip: &str| {
            Request::builder()
                .uri("/api/cache/stats")
                .header("x-api-key", KEY)
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(harness.send(from("203.0.113.1")).await.status(), StatusCode::OK);
        assert_eq!(harness.send(from("203.0.113.1")).await.status(), StatusCode::OK);

        let limited = harness.send(from("203.0.113.1")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(json_body(limited).await, json!({"error": "Rate limit exceeded"}));

        assert_eq!(harness.send(from("203.0.113.2")).await.status(), StatusCode::OK);

        // Health is outside the quota
        let health = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(harness.send(health).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let harness = Harness::new().await;
        let body = json!({"wallets": [WALLET_A, WALLET_A]});
        harness.send(post_json("/api/get-balance", Some(KEY), body)).await;

        let response = harness.send(get_with_key("/api/cache/stats")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let stats = json_body(response).await;
        assert_eq!(stats["total_entries"], 1);
        assert_eq!(stats["upstream_calls"], 1);
        assert_eq!(stats["in_flight"], 0);
    }

    #[tokio::test]
    async fn test_alert_route() {
        let harness = Harness::new().await;

        let response = harness
            .send(post_json("/api/alert/test", Some(KEY), json!({})))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"sent": true}));
        assert_eq!(harness.alerts.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_500_and_alert() {
        let harness = Harness::new().await;
        let app = Router::new()
            .route("/boom", get(|| async { panic!("wallet index out of range") as () }))
            .layer(CatchPanicLayer::custom(PanicAlerter::new(harness.state.alerts.clone())));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"error": "Internal Server Error"}));

        let messages = harness.alerts.messages.lock();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("⚠️ PANIC: wallet index out of range\n"));
        assert!(messages[0].lines().count() > 1);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requests_are_logged_at_info() {
        let harness = Harness::new().await;
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("tower_http=info")
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = harness
            .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("finished processing request"));
        assert!(output.contains("INFO"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_upstream_call() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {"value": 99}}))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiConfig::new(server.uri());
        let client = SolanaRpcClient::with_config(RpcConfig::new(server.uri())).unwrap();
        let harness = Harness::with_config(config, Arc::new(client)).await;

        let requests = (0..5).map(|_| {
            harness.send(post_json(
                "/api/get-balance",
                Some(KEY),
                json!({"wallets": [WALLET_A]}),
            ))
        });
        let responses = futures::future::join_all(requests).await;

        for response in responses {
            let body = json_body(response).await;
            assert_eq!(body["balances"][0]["balance"], 99);
        }
        server.verify().await;
    }
}

//! CampusPress API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication (bearer tokens to trusted identity headers)
//! - Rate limiting
//! - Request routing to the submission and content services
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;
mod proxy;

use axum::{http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
use campuspress_common::{
    auth::TokenManager,
    config::{AppConfig, Service},
    errors::AppError,
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::middleware::rate_limit::{create_rate_limiter, GlobalRateLimiter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub tokens: Arc<TokenManager>,
    pub limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret is required by the gateway".to_string(),
            })?;
        let tokens = Arc::new(TokenManager::new(secret, config.auth.jwt_expiration_secs));

        let limiter = if config.rate_limit.enabled {
            Some(create_rate_limiter(
                config.rate_limit.requests_per_second,
                config.rate_limit.burst,
            )?)
        } else {
            warn!("Rate limiting disabled");
            None
        };

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()?;

        Ok(Self {
            config,
            http,
            tokens,
            limiter,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load(Service::Gateway);
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_else(|_| AppConfig::for_service(Service::Gateway).observability);
    telemetry::init_tracing(&observability);

    info!("Starting CampusPress API Gateway v{}", campuspress_common::VERSION);

    // Load configuration
    let config = loaded.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    telemetry::init_metrics_exporter(&config.observability)?;

    let state = AppState::new(config.clone())?;
    info!(
        submission = %config.services.submission_url,
        content = %config.services.content_url,
        "Routing to upstream services"
    );

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();
    let timeout = state.config.request_timeout();

    // Everything that is not a health probe goes through auth and the limiter
    let proxied = Router::new()
        .fallback(proxy::forward)
        .layer(from_fn_with_state(state.clone(), middleware::auth::authenticate))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit));

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(proxied)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(telemetry::make_request_span))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::Request as AxumRequest;
    use axum::http::{header, Request, StatusCode};
    use axum::Json;
    use campuspress_common::auth::{Role, USER_ID_HEADER, USER_ROLE_HEADER};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    /// Upstream that answers every request with what it received
    async fn spawn_upstream(name: &'static str) -> String {
        let app = Router::new().fallback(move |request: AxumRequest| async move {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap();
            let headers: serde_json::Map<String, Value> = parts
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
                .collect();
            Json(json!({
                "service": name,
                "method": parts.method.as_str(),
                "uri": parts.uri.to_string(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            }))
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Address nothing listens on
    async fn closed_port() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn config(submission_url: String, content_url: String) -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some(SECRET.to_string());
        config.services.submission_url = submission_url;
        config.services.content_url = content_url;
        config.rate_limit.enabled = false;
        config
    }

    async fn gateway() -> Router {
        let config = config(spawn_upstream("submission").await, spawn_upstream("content").await);
        create_router(AppState::new(Arc::new(config)).unwrap())
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_identity_headers_are_stripped() {
        let app = gateway().await;
        let request = Request::builder()
            .uri("/submissions/me")
            .header(USER_ID_HEADER, "u-admin")
            .header(USER_ROLE_HEADER, "ADMIN")
            .header("x-internal-token", "guess")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let seen = json_body(response).await;
        assert_eq!(seen["service"], "submission");
        assert!(seen["headers"].get(USER_ID_HEADER).is_none());
        assert!(seen["headers"].get(USER_ROLE_HEADER).is_none());
        assert!(seen["headers"].get("x-internal-token").is_none());
        assert!(seen["headers"].get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_valid_token_becomes_identity_headers() {
        let app = gateway().await;
        let token = TokenManager::new(SECRET, 3600)
            .issue("u-1", "ada@univ.example", Role::Student)
            .unwrap();
        let request = Request::builder()
            .uri("/users/permissions/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(USER_ROLE_HEADER, "ADMIN")
            .body(Body::empty())
            .unwrap();

        let seen = json_body(app.oneshot(request).await.unwrap()).await;
        assert_eq!(seen["headers"][USER_ID_HEADER], "u-1");
        assert_eq!(seen["headers"]["x-user-email"], "ada@univ.example");
        assert_eq!(seen["headers"][USER_ROLE_HEADER], "STUDENT");
        assert!(seen["headers"].get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_bad_tokens_are_rejected() {
        let app = gateway().await;
        let foreign = TokenManager::new("someone-else", 3600)
            .issue("u-1", "ada@univ.example", Role::Admin)
            .unwrap();

        for value in [format!("Bearer {}", foreign), "Bearer not.a.jwt".to_string()] {
            let request = Request::builder()
                .uri("/submissions/me")
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(json_body(response).await["error"], "INVALID_TOKEN");
        }

        let request = Request::builder()
            .uri("/submissions/me")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_routing_preserves_method_query_and_body() {
        let app = gateway().await;

        let request = Request::builder()
            .uri("/publications?domain=Biology&page=1")
            .body(Body::empty())
            .unwrap();
        let seen = json_body(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(seen["service"], "content");
        assert_eq!(seen["uri"], "/publications?domain=Biology&page=1");

        let request = Request::builder()
            .method("POST")
            .uri("/admin/submissions/3/reject")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"comment":"Out of scope"}"#))
            .unwrap();
        let seen = json_body(app.oneshot(request).await.unwrap()).await;
        assert_eq!(seen["service"], "submission");
        assert_eq!(seen["method"], "POST");
        assert_eq!(seen["body"], r#"{"comment":"Out of scope"}"#);
        assert_eq!(seen["headers"]["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_internal_routes_are_not_exposed() {
        let app = gateway().await;
        for uri in ["/internal/publications", "/internal", "/unknown"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(json_body(response).await["error"], "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bad_gateway() {
        let config = config(spawn_upstream("submission").await, closed_port().await);
        let app = create_router(AppState::new(Arc::new(config)).unwrap());

        let request = Request::builder()
            .uri("/publications/1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "UPSTREAM_ERROR");

        let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["submission_service"]["status"], "up");
        assert_eq!(body["checks"]["content_service"]["status"], "down");
    }

    #[tokio::test]
    async fn test_rate_limit_spares_health() {
        let mut config = config(spawn_upstream("submission").await, spawn_upstream("content").await);
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = create_router(AppState::new(Arc::new(config)).unwrap());

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

        let response = app.clone().oneshot(get("/permissions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/permissions")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(response).await["error"], "RATE_LIMITED");

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_with_408() {
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            "late"
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let slow = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = config(spawn_upstream("submission").await, slow);
        config.server.request_timeout_secs = 1;
        config.services.request_timeout_secs = 30;
        let app = create_router(AppState::new(Arc::new(config)).unwrap());

        let request = Request::builder()
            .uri("/publications")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_gateway_requires_jwt_secret() {
        let config = AppConfig::default();
        assert!(matches!(
            AppState::new(Arc::new(config)),
            Err(AppError::Configuration { .. })
        ));
    }
}

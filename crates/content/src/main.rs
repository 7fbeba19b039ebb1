//! CampusPress Content Service
//!
//! Owns published works:
//! - Internal publication handoff from the submission service, idempotent per submission
//! - Public reading API over published works

mod db;
mod handlers;

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use campuspress_common::{
    config::{AppConfig, Service}, db::DbPool, errors::AppError, metrics::track_requests,
    publication::CREATE_PUBLICATION_PATH, telemetry, VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::db::{InMemoryPublicationStore, PublicationRepository, PublicationStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PublicationStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load(Service::Content);
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_else(|_| AppConfig::for_service(Service::Content).observability);
    telemetry::init_tracing(&observability);

    info!("Starting CampusPress Content Service v{}", VERSION);

    let config = Arc::new(loaded.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?);

    telemetry::init_metrics_exporter(&config.observability)?;

    if config.services.internal_token.is_none() {
        warn!("No internal token configured, {} is unprotected", CREATE_PUBLICATION_PATH);
    }

    let store = build_store(&config).await?;
    let state = AppState {
        config: config.clone(),
        store,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Content service shutdown complete");
    Ok(())
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn PublicationStore>, AppError> {
    if config.database.url.starts_with("memory:") {
        info!("Using in-memory publication store");
        return Ok(Arc::new(InMemoryPublicationStore::new()));
    }

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(db.write().get_postgres_connection_pool())
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Migration failed: {}", e),
            })?;
        info!("Migrations applied");
    }

    Ok(Arc::new(PublicationRepository::new(db)))
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();
    let timeout = state.config.request_timeout();

    let internal = Router::new()
        .route(CREATE_PUBLICATION_PATH, post(handlers::internal::create_publication))
        .route_layer(from_fn_with_state(
            state.clone(),
            handlers::internal::require_internal_token,
        ));

    let public = Router::new()
        .route("/publications", get(handlers::publications::list_publications))
        .route("/publications/{id}", get(handlers::publications::get_publication));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(internal.merge(public).route_layer(from_fn(track_requests)))
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
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

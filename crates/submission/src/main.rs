//! CampusPress Submission Service
//!
//! Owns the submission workflow:
//! - Intake of metadata and PDF files
//! - Moderation (approve, reject, request revisions) and withdrawal
//! - Publication handoff to the content service on approval
//! - Permission introspection for the current caller

mod db;
mod handlers;
mod services;
mod workflow;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use campuspress_common::{
    auth::{RoleGuard, RolePermissionMap},
    config::{AppConfig, Service},
    db::DbPool,
    errors::AppError,
    metrics::track_requests,
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
use tracing::info;

use crate::db::{InMemorySubmissionStore, SubmissionRepository, SubmissionStore};
use crate::services::{
    ContentClient, HttpContentClient, HttpNotifier, InMemoryStorage, LogNotifier, Notifier,
    ObjectStorage, S3Storage, SubmissionService, SubmissionSettings,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub submissions: Arc<SubmissionService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load(Service::Submission);
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_else(|_| AppConfig::for_service(Service::Submission).observability);
    telemetry::init_tracing(&observability);

    info!("Starting CampusPress Submission Service v{}", campuspress_common::VERSION);

    let config = loaded.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;
    let config = Arc::new(config);

    telemetry::init_metrics_exporter(&config.observability)?;

    let store = build_store(&config).await?;
    let storage = build_storage(&config).await?;

    let content: Arc<dyn ContentClient> = Arc::new(HttpContentClient::new(
        &config.services.content_url,
        config.services.internal_token.clone(),
        config.upstream_timeout(),
    )?);

    let notifier: Arc<dyn Notifier> = match config.services.notification_url {
        Some(ref url) => Arc::new(HttpNotifier::new(
            url,
            config.services.internal_token.clone(),
            config.upstream_timeout(),
        )?),
        None => {
            info!("No notification service configured, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    // Built once, shared read-only by every request
    let guard = RoleGuard::new(Arc::new(RolePermissionMap::standard()));

    let submissions = Arc::new(SubmissionService::new(
        store,
        storage,
        content,
        notifier,
        guard,
        SubmissionSettings::from_config(&config),
    ));

    let state = AppState {
        config: config.clone(),
        submissions,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Postgres, or process memory when `database.url` is `memory://`
async fn build_store(config: &AppConfig) -> Result<Arc<dyn SubmissionStore>, AppError> {
    if config.database.url.starts_with("memory:") {
        info!("Using in-memory submission store");
        return Ok(Arc::new(InMemorySubmissionStore::new()));
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

    Ok(Arc::new(SubmissionRepository::new(db)))
}

async fn build_storage(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>, AppError> {
    match config.storage.backend.as_str() {
        "s3" | "r2" => Ok(Arc::new(S3Storage::from_config(&config.storage).await?)),
        "memory" => {
            info!("Using in-memory object storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown storage backend '{}'", other),
        }),
    }
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

    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_bytes);

    let routes = Router::new()
        // Author endpoints
        .route("/submissions", post(handlers::submissions::create_submission))
        .route("/submissions/me", get(handlers::submissions::list_my_submissions))
        .route(
            "/submissions/{id}",
            get(handlers::submissions::get_submission)
                .delete(handlers::submissions::withdraw_submission),
        )
        .route("/submissions/{id}/file", get(handlers::submissions::get_submission_file))
        .route("/submissions/{id}/history", get(handlers::submissions::get_submission_history))

        // Moderation endpoints
        .route("/admin/submissions", get(handlers::admin::list_queue))
        .route("/admin/submissions/{id}/validate", post(handlers::admin::validate_submission))
        .route("/admin/submissions/{id}/reject", post(handlers::admin::reject_submission))
        .route(
            "/admin/submissions/{id}/request-revisions",
            post(handlers::admin::request_revisions),
        )

        // Permission introspection
        .route("/users/permissions/me", get(handlers::permissions::my_permissions))
        .route("/permissions", get(handlers::permissions::catalog))
        .route_layer(from_fn(track_requests));

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(routes)
        .layer(body_limit)
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
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

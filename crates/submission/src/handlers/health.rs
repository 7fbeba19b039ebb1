//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use campuspress_common::errors::Result;
use serde::Serialize;
use std::future::Future;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub content_service: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

async fn check(probe: impl Future<Output = Result<()>>) -> CheckResult {
    let start = std::time::Instant::now();
    match probe.await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: campuspress_common::VERSION,
    })
}

/// Readiness probe - checks the database and the content service
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (database, content_service) = tokio::join!(
        check(state.submissions.store().ping()),
        check(state.submissions.content().ping()),
    );

    // The content service is only needed for approvals
    let status = if database.is_up() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let label = match (database.is_up(), content_service.is_up()) {
        (true, true) => "ready",
        (true, false) => "degraded",
        _ => "not_ready",
    };

    (
        status,
        Json(ReadyResponse {
            status: label.to_string(),
            checks: HealthChecks {
                database,
                content_service,
            },
        }),
    )
}

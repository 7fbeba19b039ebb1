//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::proxy::Upstream;
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
    pub submission_service: CheckResult,
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

async fn probe(state: &AppState, upstream: Upstream) -> CheckResult {
    let start = std::time::Instant::now();
    let url = format!("{}/health", upstream.base_url(&state.config.services));

    let outcome = match state.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => Ok(()),
        Ok(response) => Err(format!("responded with {}", response.status())),
        Err(e) => Err(e.to_string()),
    };

    match outcome {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(error) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(error),
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

/// Readiness probe - checks both backing services
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (submission_service, content_service) = tokio::join!(
        probe(&state, Upstream::Submission),
        probe(&state, Upstream::Content),
    );

    let all_up = submission_service.status == "up" && content_service.status == "up";
    let status = if all_up { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(ReadyResponse {
            status: if all_up { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks {
                submission_service,
                content_service,
            },
        }),
    )
}

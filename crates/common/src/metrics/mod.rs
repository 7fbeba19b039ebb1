//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use axum::{extract::MatchedPath, extract::Request, middleware::Next, response::Response};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CampusPress metrics
pub const METRICS_PREFIX: &str = "campuspress";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 500ms (uploads dominate the tail)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms - P99 target
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_submissions_created_total", METRICS_PREFIX),
        Unit::Count,
        "Submissions accepted for review"
    );

    describe_counter!(
        format!("{}_submission_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Workflow transitions attempted, by event and outcome"
    );

    describe_counter!(
        format!("{}_publications_created_total", METRICS_PREFIX),
        Unit::Count,
        "Published works created from validated submissions"
    );

    // Authorization metrics
    describe_counter!(
        format!("{}_authorization_denials_total", METRICS_PREFIX),
        Unit::Count,
        "Requests rejected by the authorization guard"
    );

    // Collaborator metrics
    describe_counter!(
        format!("{}_downstream_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Failed calls to storage or other services"
    );

    describe_counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Best-effort notifications that could not be delivered"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Axum middleware recording request count and latency per matched route
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());
    response
}

/// Helper to record a workflow transition attempt
pub fn record_transition(event: &str, outcome: &str) {
    counter!(
        format!("{}_submission_transitions_total", METRICS_PREFIX),
        "event" => event.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_submission_created(research_domain: &str) {
    counter!(
        format!("{}_submissions_created_total", METRICS_PREFIX),
        "domain" => research_domain.to_string()
    )
    .increment(1);
}

pub fn record_publication_created(deduplicated: bool) {
    counter!(
        format!("{}_publications_created_total", METRICS_PREFIX),
        "deduplicated" => deduplicated.to_string()
    )
    .increment(1);
}

pub fn record_authorization_denial(requirement: &str) {
    counter!(
        format!("{}_authorization_denials_total", METRICS_PREFIX),
        "required" => requirement.to_string()
    )
    .increment(1);
}

/// Helper to record a failed call to storage or another service
pub fn record_downstream_error(service: &str, operation: &str) {
    counter!(
        format!("{}_downstream_errors_total", METRICS_PREFIX),
        "service" => service.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_notification_failure(kind: &str) {
    counter!(
        format!("{}_notifications_failed_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.500));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // With no recorder installed these are no-ops; they must not panic
        let metrics = RequestMetrics::start("POST", "/submissions");
        metrics.finish(201);
        record_transition("approve", "committed");
        record_downstream_error("content-service", "create_publication");
    }
}

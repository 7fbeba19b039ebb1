//! Logging and metrics exporter setup shared by every binary

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use crate::metrics::{LATENCY_BUCKETS, METRICS_PREFIX};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use axum::http::Request;
use std::net::SocketAddr;
use tracing::{info, Span};
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus exporter on the configured port (0 disables it)
pub fn init_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .set_buckets_for_metric(
            Matcher::Prefix(format!("{}_", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )
        .and_then(|builder| builder.install())
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;

    crate::metrics::register_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Span for one HTTP request, with empty identity fields the
/// [`Identity`](crate::auth::Identity) extractor fills in.
///
/// Use with `TraceLayer::new_for_http().make_span_with(make_request_span)`.
pub fn make_request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        user_id = tracing::field::Empty,
        role = tracing::field::Empty,
    )
}

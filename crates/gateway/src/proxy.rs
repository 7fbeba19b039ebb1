//! Forwarding of public routes to the backing services

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use campuspress_common::{
    config::ServicesConfig,
    errors::{AppError, Result},
    metrics::{record_downstream_error, RequestMetrics},
};
use tracing::{debug, warn};

use crate::AppState;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [header::HeaderName; 9] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Submission,
    Content,
}

impl Upstream {
    pub fn name(&self) -> &'static str {
        match self {
            Upstream::Submission => "submission-service",
            Upstream::Content => "content-service",
        }
    }

    pub fn base_url<'a>(&self, services: &'a ServicesConfig) -> &'a str {
        let url = match self {
            Upstream::Submission => &services.submission_url,
            Upstream::Content => &services.content_url,
        };
        url.trim_end_matches('/')
    }
}

/// Pick the service for a public path. `/internal/*` and unknown paths have none.
pub fn route(path: &str) -> Option<Upstream> {
    let first = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    match first {
        "submissions" | "admin" | "users" | "permissions" => Some(Upstream::Submission),
        "publications" => Some(Upstream::Content),
        _ => None,
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Fallback handler: forward the request to its service and relay the answer
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let Some(upstream) = route(&path) else {
        debug!(path = %path, "No upstream for path");
        return AppError::NotFound {
            resource_type: "route".to_string(),
            id: path,
        }
        .into_response();
    };

    let metrics = RequestMetrics::start(request.method().as_str(), upstream.name());
    let response = match relay(&state, upstream, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    metrics.finish(response.status().as_u16());
    response
}

async fn relay(state: &AppState, upstream: Upstream, request: Request) -> Result<Response> {
    let limit = state.config.server.max_body_bytes;
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", upstream.base_url(&state.config.services), path_and_query);

    let body = to_bytes(body, limit)
        .await
        .map_err(|_| AppError::PayloadTooLarge { size: limit, limit })?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    let failed = |e: reqwest::Error| {
        record_downstream_error(upstream.name(), "proxy");
        warn!(upstream = upstream.name(), url = %url, error = %e, "Upstream call failed");
        AppError::Upstream {
            service: upstream.name().to_string(),
            message: e.to_string(),
        }
    };

    let upstream_response = state
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(failed)?;

    let status = upstream_response.status();
    let mut headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut headers);
    let bytes = upstream_response.bytes().await.map_err(failed)?;

    debug!(upstream = upstream.name(), status = %status, size = bytes.len(), "Relayed response");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        assert_eq!(route("/submissions"), Some(Upstream::Submission));
        assert_eq!(route("/submissions/me"), Some(Upstream::Submission));
        assert_eq!(route("/admin/submissions/4/validate"), Some(Upstream::Submission));
        assert_eq!(route("/users/permissions/me"), Some(Upstream::Submission));
        assert_eq!(route("/permissions"), Some(Upstream::Submission));
        assert_eq!(route("/publications"), Some(Upstream::Content));
        assert_eq!(route("/publications/12"), Some(Upstream::Content));
    }

    #[test]
    fn test_internal_and_unknown_paths_are_not_routed() {
        assert_eq!(route("/internal/publications"), None);
        assert_eq!(route("/internal"), None);
        assert_eq!(route("/"), None);
        assert_eq!(route("/submissionsx"), None);
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let services = ServicesConfig {
            submission_url: "http://submission:8081/".to_string(),
            ..ServicesConfig::default()
        };
        assert_eq!(
            Upstream::Submission.base_url(&services),
            "http://submission:8081"
        );
    }
}

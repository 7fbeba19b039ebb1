//! Service-to-service endpoints, never routed by the gateway

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use campuspress_common::{
    auth::INTERNAL_TOKEN_HEADER,
    errors::{AppError, Result},
    metrics::record_publication_created,
    publication::{PublicationCreated, PublicationDraft},
};
use tracing::{info, warn};
use validator::Validate;

use crate::AppState;

/// Reject calls without the shared secret, when one is configured
pub async fn require_internal_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(ref expected) = state.config.services.internal_token {
        let presented = request
            .headers()
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());

        if presented != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Internal call without a valid token");
            return Err(AppError::Unauthorized {
                message: "missing or invalid internal token".to_string(),
            });
        }
    }

    Ok(next.run(request).await)
}

/// Create the publication for a validated submission.
///
/// Returns 201 for a new publication and 200 with `deduplicated: true` when
/// one already exists for the same source submission.
pub async fn create_publication(
    State(state): State<AppState>,
    Json(draft): Json<PublicationDraft>,
) -> Result<(StatusCode, Json<PublicationCreated>)> {
    draft.validate()?;

    let source_submission_id = draft.source_submission_id;
    let published = state.store.publish(draft).await?;
    let deduplicated = !published.created;
    record_publication_created(deduplicated);

    if deduplicated {
        info!(
            publication_id = published.publication.id,
            source_submission_id,
            "Publication already exists for submission"
        );
    } else {
        info!(
            publication_id = published.publication.id,
            source_submission_id,
            approved_by = %published.publication.approved_by,
            "Publication created"
        );
    }

    let status = if deduplicated { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(PublicationCreated {
            publication_id: published.publication.id,
            deduplicated,
        }),
    ))
}

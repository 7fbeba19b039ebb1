//! Moderation handlers under `/admin/submissions`

use axum::{
    extract::{Path, Query, State},
    Json,
};
use campuspress_common::{
    auth::Identity,
    db::{Page, PageQuery},
    errors::{AppError, Result},
};
use serde::Deserialize;

use super::ModerationRequest;
use crate::db::Submission;
use crate::workflow::SubmissionStatus;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct QueueQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Moderation queue, oldest first, optionally filtered by status
pub async fn list_queue(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Page<Submission>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<SubmissionStatus>()
                .map_err(|e| AppError::validation("status", e.to_string()))
        })
        .transpose()?;

    let page = state
        .submissions
        .list_for_moderation(
            &identity,
            status,
            PageQuery {
                page: query.page,
                size: query.size,
            },
        )
        .await?;
    Ok(Json(page))
}

/// Approve and publish
pub async fn validate_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    body: Option<Json<ModerationRequest>>,
) -> Result<Json<Submission>> {
    let comment = body.and_then(|Json(b)| b.comment);
    Ok(Json(state.submissions.approve(&identity, id, comment).await?))
}

pub async fn reject_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    body: Option<Json<ModerationRequest>>,
) -> Result<Json<Submission>> {
    let comment = body.and_then(|Json(b)| b.comment);
    Ok(Json(state.submissions.reject(&identity, id, comment).await?))
}

pub async fn request_revisions(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
    body: Option<Json<ModerationRequest>>,
) -> Result<Json<Submission>> {
    let comment = body.and_then(|Json(b)| b.comment);
    Ok(Json(
        state.submissions.request_revision(&identity, id, comment).await?,
    ))
}

//! Author-facing submission handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use campuspress_common::{
    auth::Identity,
    db::{Page, PageQuery},
    errors::{AppError, Result},
};

use crate::db::{ModerationEvent, Submission};
use crate::services::storage::FileUpload;
use crate::services::submissions::FileLink;
use crate::services::validation::SubmissionMetadata;
use crate::AppState;

const FILE_PART: &str = "file";
const METADATA_PART: &str = "metadata";

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { size: limit, limit }
    } else {
        AppError::InvalidFormat {
            message: err.body_text(),
        }
    }
}

/// Split a multipart upload into its metadata and file parts
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<(SubmissionMetadata, FileUpload)> {
    let mut metadata = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        match field.name() {
            Some(METADATA_PART) => {
                let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
                let parsed: SubmissionMetadata = serde_json::from_str(&text).map_err(|e| {
                    AppError::validation(METADATA_PART, format!("invalid metadata: {}", e))
                })?;
                metadata = Some(parsed);
            }
            Some(FILE_PART) => {
                let file_name = field.file_name().unwrap_or("submission.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                file = Some(FileUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            other => {
                tracing::debug!(part = ?other, "Ignoring unknown multipart part");
            }
        }
    }

    let metadata = metadata.ok_or_else(|| AppError::MissingField {
        field: METADATA_PART.to_string(),
    })?;
    let file = file.ok_or_else(|| AppError::MissingField {
        field: FILE_PART.to_string(),
    })?;
    Ok((metadata, file))
}

/// Create a submission from a multipart upload (`metadata` JSON + `file`)
pub async fn create_submission(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>)> {
    let (metadata, file) = read_upload(multipart, state.config.server.max_body_bytes).await?;
    let submission = state.submissions.create(&identity, metadata, file).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// The caller's own submissions, newest first
pub async fn list_my_submissions(
    State(state): State<AppState>,
    identity: Identity,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Submission>>> {
    Ok(Json(state.submissions.list_mine(&identity, page).await?))
}

pub async fn get_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Result<Json<Submission>> {
    Ok(Json(state.submissions.get(&identity, id).await?))
}

/// Signed download link for the submitted file
pub async fn get_submission_file(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Result<Json<FileLink>> {
    Ok(Json(state.submissions.file_url(&identity, id).await?))
}

pub async fn get_submission_history(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ModerationEvent>>> {
    Ok(Json(state.submissions.history(&identity, id).await?))
}

/// Withdraw a submission (owner only)
pub async fn withdraw_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Result<Json<Submission>> {
    Ok(Json(state.submissions.withdraw(&identity, id).await?))
}

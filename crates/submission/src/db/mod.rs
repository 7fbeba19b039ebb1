//! Persistence for submissions and their moderation trail
//!
//! Provides:
//! - SeaORM entity models
//! - The [`SubmissionStore`] seam with a Postgres repository and an in-memory store
//! - Domain records handed to the service layer

mod memory;
pub mod models;
mod repository;

pub use memory::InMemorySubmissionStore;
pub use repository::SubmissionRepository;

use async_trait::async_trait;
use campuspress_common::db::Page;
use campuspress_common::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{can_transition, SubmissionEvent, SubmissionStatus};

/// A submission as seen by the service layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub research_domain: String,
    pub file_key: String,
    pub file_name: String,
    pub file_content_type: String,
    pub file_size: i64,
    pub file_sha256: String,
    pub status: SubmissionStatus,
    pub reviewer_email: Option<String>,
    pub review_comment: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub publication_id: Option<i64>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded file that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub sha256: String,
}

/// Everything needed to insert a PENDING submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub owner_id: String,
    pub owner_email: Option<String>,
    pub title: String,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub research_domain: String,
    pub file: StoredFile,
}

/// A status change to commit, guarded by the version it was computed from
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub submission_id: i64,
    pub expected_version: i32,
    pub event: SubmissionEvent,
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub comment: Option<String>,
    pub publication_id: Option<i64>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// Moderator decisions record the reviewer on the submission; withdrawal does not
    pub fn records_review(&self) -> bool {
        self.event != SubmissionEvent::Withdraw
    }

    pub fn reviewer(&self) -> String {
        self.actor_email.clone().unwrap_or_else(|| self.actor_id.clone())
    }
}

/// One entry of the moderation trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationEvent {
    pub id: i64,
    pub submission_id: i64,
    pub action: SubmissionEvent,
    pub actor_id: String,
    pub actor_email: Option<String>,
    pub comment: Option<String>,
    pub from_status: SubmissionStatus,
    pub to_status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

/// Storage seam for submissions
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert a new submission in PENDING with version 0
    async fn insert(&self, new: NewSubmission) -> Result<Submission>;

    async fn find(&self, id: i64) -> Result<Option<Submission>>;

    /// Newest first
    async fn list_by_owner(&self, owner_id: &str, page: u64, size: u64) -> Result<Page<Submission>>;

    /// Oldest first, optionally filtered by status
    async fn list_by_status(
        &self,
        status: Option<SubmissionStatus>,
        page: u64,
        size: u64,
    ) -> Result<Page<Submission>>;

    /// Commit a status change and its moderation event atomically.
    ///
    /// Fails with `Conflict` when the stored version differs from
    /// `expected_version`, leaving the submission untouched.
    async fn apply(&self, change: StatusChange) -> Result<Submission>;

    /// Moderation trail, oldest first
    async fn history(&self, submission_id: i64) -> Result<Vec<ModerationEvent>>;

    async fn ping(&self) -> Result<()>;
}

pub(crate) fn stale_version(change: &StatusChange) -> AppError {
    AppError::Conflict {
        message: format!(
            "submission {} was modified concurrently (expected version {})",
            change.submission_id, change.expected_version
        ),
    }
}

/// Refuse a status change no workflow event produces
pub(crate) fn ensure_legal(change: &StatusChange) -> Result<()> {
    if can_transition(change.from, change.to) {
        return Ok(());
    }
    Err(AppError::IllegalStateTransition {
        current: change.from.to_string(),
        attempted: change.event.verb().to_string(),
        reason: format!("no transition from {} to {}", change.from, change.to),
    })
}

//! Postgres-backed submission store
//!
//! Status changes run as a version-guarded `UPDATE` plus the moderation
//! event insert inside one transaction.

use async_trait::async_trait;
use campuspress_common::db::{DbPool, Page};
use campuspress_common::{AppError, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, instrument};

use super::models::*;
use super::{
    ensure_legal, stale_version, ModerationEvent, NewSubmission, StatusChange, Submission,
    SubmissionStore,
};
use crate::workflow::{SubmissionEvent, SubmissionStatus};

/// Repository for submission data access
#[derive(Clone)]
pub struct SubmissionRepository {
    pool: DbPool,
}

impl SubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

// ========================================================================
// Row conversions
// ========================================================================

fn corrupt(what: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Internal {
        message: format!("Corrupt {} in database: {}", what, err),
    }
}

fn parse_status(raw: &str) -> Result<SubmissionStatus> {
    raw.parse().map_err(|e| corrupt("status", e))
}

fn parse_event(raw: &str) -> Result<SubmissionEvent> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| corrupt("moderation action", e))
}

fn string_list(value: serde_json::Value) -> Result<Vec<String>> {
    serde_json::from_value(value).map_err(|e| corrupt("string list", e))
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> Result<Self> {
        Ok(Submission {
            id: row.id,
            status: parse_status(&row.status)?,
            authors: string_list(row.authors)?,
            keywords: string_list(row.keywords)?,
            owner_id: row.owner_id,
            owner_email: row.owner_email,
            title: row.title,
            abstract_text: row.abstract_text,
            research_domain: row.research_domain,
            file_key: row.file_key,
            file_name: row.file_name,
            file_content_type: row.file_content_type,
            file_size: row.file_size,
            file_sha256: row.file_sha256,
            reviewer_email: row.reviewer_email,
            review_comment: row.review_comment,
            reviewed_at: row.reviewed_at.map(Into::into),
            publication_id: row.publication_id,
            version: row.version,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.into(),
        })
    }
}

impl TryFrom<ModerationEventRow> for ModerationEvent {
    type Error = AppError;

    fn try_from(row: ModerationEventRow) -> Result<Self> {
        Ok(ModerationEvent {
            id: row.id,
            submission_id: row.submission_id,
            action: parse_event(&row.action)?,
            actor_id: row.actor_id,
            actor_email: row.actor_email,
            comment: row.comment,
            from_status: parse_status(&row.from_status)?,
            to_status: parse_status(&row.to_status)?,
            created_at: row.created_at.into(),
        })
    }
}

fn into_page(rows: Vec<SubmissionRow>, page: u64, size: u64, total: u64) -> Result<Page<Submission>> {
    let items = rows
        .into_iter()
        .map(Submission::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(Page::new(items, page, size, total))
}

#[async_trait]
impl SubmissionStore for SubmissionRepository {
    // ========================================================================
    // Submission Operations
    // ========================================================================

    #[instrument(skip(self, new), fields(owner_id = %new.owner_id))]
    async fn insert(&self, new: NewSubmission) -> Result<Submission> {
        let now = chrono::Utc::now();

        let row = SubmissionActiveModel {
            owner_id: Set(new.owner_id),
            owner_email: Set(new.owner_email),
            title: Set(new.title),
            abstract_text: Set(new.abstract_text),
            authors: Set(serde_json::to_value(new.authors)?),
            keywords: Set(serde_json::to_value(new.keywords)?),
            research_domain: Set(new.research_domain),
            file_key: Set(new.file.key),
            file_name: Set(new.file.name),
            file_content_type: Set(new.file.content_type),
            file_size: Set(new.file.size),
            file_sha256: Set(new.file.sha256),
            status: Set(SubmissionStatus::Pending.as_str().to_string()),
            reviewer_email: Set(None),
            review_comment: Set(None),
            reviewed_at: Set(None),
            publication_id: Set(None),
            version: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let row = row.insert(self.write_conn()).await?;
        debug!(submission_id = row.id, "Submission row inserted");
        row.try_into()
    }

    async fn find(&self, id: i64) -> Result<Option<Submission>> {
        SubmissionEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(Submission::try_from)
            .transpose()
    }

    async fn list_by_owner(&self, owner_id: &str, page: u64, size: u64) -> Result<Page<Submission>> {
        let paginator = SubmissionEntity::find()
            .filter(SubmissionColumn::OwnerId.eq(owner_id))
            .order_by_desc(SubmissionColumn::CreatedAt)
            .order_by_desc(SubmissionColumn::Id)
            .paginate(self.read_conn(), size);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page).await?;
        into_page(rows, page, size, total)
    }

    async fn list_by_status(
        &self,
        status: Option<SubmissionStatus>,
        page: u64,
        size: u64,
    ) -> Result<Page<Submission>> {
        let mut query = SubmissionEntity::find();
        if let Some(status) = status {
            query = query.filter(SubmissionColumn::Status.eq(status.as_str()));
        }

        let paginator = query
            .order_by_asc(SubmissionColumn::CreatedAt)
            .order_by_asc(SubmissionColumn::Id)
            .paginate(self.read_conn(), size);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page).await?;
        into_page(rows, page, size, total)
    }

    // ========================================================================
    // Workflow Operations
    // ========================================================================

    #[instrument(
        skip(self, change),
        fields(submission_id = change.submission_id, event = %change.event, to = %change.to)
    )]
    async fn apply(&self, change: StatusChange) -> Result<Submission> {
        ensure_legal(&change)?;
        let txn = self.write_conn().begin().await?;
        let at: sea_orm::prelude::DateTimeWithTimeZone = change.at.into();

        let mut update = SubmissionEntity::update_many()
            .col_expr(SubmissionColumn::Status, Expr::value(change.to.as_str()))
            .col_expr(
                SubmissionColumn::Version,
                Expr::col(SubmissionColumn::Version).add(1),
            )
            .col_expr(SubmissionColumn::UpdatedAt, Expr::value(at));

        if change.records_review() {
            update = update
                .col_expr(SubmissionColumn::ReviewerEmail, Expr::value(change.reviewer()))
                .col_expr(SubmissionColumn::ReviewComment, Expr::value(change.comment.clone()))
                .col_expr(SubmissionColumn::ReviewedAt, Expr::value(at));
        }
        if let Some(publication_id) = change.publication_id {
            update = update.col_expr(SubmissionColumn::PublicationId, Expr::value(publication_id));
        }

        let result = update
            .filter(SubmissionColumn::Id.eq(change.submission_id))
            .filter(SubmissionColumn::Version.eq(change.expected_version))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(stale_version(&change));
        }

        ModerationEventActiveModel {
            submission_id: Set(change.submission_id),
            action: Set(change.event.as_str().to_string()),
            actor_id: Set(change.actor_id.clone()),
            actor_email: Set(change.actor_email.clone()),
            comment: Set(change.comment.clone()),
            from_status: Set(change.from.as_str().to_string()),
            to_status: Set(change.to.as_str().to_string()),
            created_at: Set(at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let row = SubmissionEntity::find_by_id(change.submission_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::SubmissionNotFound {
                id: change.submission_id.to_string(),
            })?;

        txn.commit().await?;
        row.try_into()
    }

    async fn history(&self, submission_id: i64) -> Result<Vec<ModerationEvent>> {
        ModerationEventEntity::find()
            .filter(ModerationEventColumn::SubmissionId.eq(submission_id))
            .order_by_asc(ModerationEventColumn::CreatedAt)
            .order_by_asc(ModerationEventColumn::Id)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(ModerationEvent::try_from)
            .collect()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row() -> SubmissionRow {
        let now = Utc::now();
        SubmissionRow {
            id: 3,
            owner_id: "u-1".to_string(),
            owner_email: None,
            title: "A study of campus bike sharing".to_string(),
            abstract_text: "x".repeat(60),
            authors: json!(["Ada Lovelace", "Alan Turing"]),
            keywords: json!(["mobility"]),
            research_domain: "Urban planning".to_string(),
            file_key: "submissions/u-1/k-paper.pdf".to_string(),
            file_name: "paper.pdf".to_string(),
            file_content_type: "application/pdf".to_string(),
            file_size: 1024,
            file_sha256: "ab".repeat(32),
            status: "IN_REVIEW".to_string(),
            reviewer_email: Some("staff@univ.example".to_string()),
            review_comment: Some("Please expand the method section".to_string()),
            reviewed_at: Some(now.into()),
            publication_id: None,
            version: 1,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let submission = Submission::try_from(row()).unwrap();
        assert_eq!(submission.status, SubmissionStatus::InReview);
        assert_eq!(submission.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(submission.version, 1);
    }

    #[test]
    fn test_corrupt_status_is_internal_error() {
        let mut bad = row();
        bad.status = "ARCHIVED".to_string();
        assert!(matches!(Submission::try_from(bad), Err(AppError::Internal { .. })));
    }

    #[test]
    fn test_event_action_parsing() {
        assert_eq!(parse_event("REQUEST_REVISION").unwrap(), SubmissionEvent::RequestRevision);
        assert!(parse_event("PUBLISH").is_err());
    }
}

//! Submission workflow orchestration
//!
//! Every operation checks identity and permissions first, then the workflow
//! and its input, and only then writes to storage, other services or the
//! database. Owner notifications go out in the background.
//! Approval calls the content service before anything is committed: when
//! that call fails the submission is left exactly as it was.

use std::sync::Arc;
use std::time::Duration;

use campuspress_common::auth::{Identity, Permission, RoleGuard};
use campuspress_common::config::AppConfig;
use campuspress_common::db::{Page, PageQuery};
use campuspress_common::metrics::{
    record_authorization_denial, record_submission_created, record_transition,
};
use campuspress_common::publication::PublicationDraft;
use campuspress_common::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::content_client::ContentClient;
use super::notifier::{dispatch, Notification, NotificationKind, Notifier};
use super::storage::{sanitize_file_name, FileUpload, ObjectStorage};
use super::validation::{validate_file, FilePolicy, SubmissionMetadata};
use crate::db::{ModerationEvent, NewSubmission, StatusChange, StoredFile, Submission, SubmissionStore};
use crate::workflow::{transition, SubmissionEvent, SubmissionStatus};

/// Tunables taken from configuration
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    pub submissions_prefix: String,
    pub signed_url_ttl: Duration,
    pub file_policy: FilePolicy,
    pub page_size: u64,
    pub max_page_size: u64,
}

impl SubmissionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            submissions_prefix: config.storage.submissions_prefix.clone(),
            signed_url_ttl: config.signed_url_ttl(),
            file_policy: FilePolicy::from(&config.submission),
            page_size: config.submission.page_size,
            max_page_size: config.submission.max_page_size,
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Signed download link for a submission file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLink {
    pub url: String,
    pub file_name: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
    storage: Arc<dyn ObjectStorage>,
    content: Arc<dyn ContentClient>,
    notifier: Arc<dyn Notifier>,
    guard: RoleGuard,
    settings: SubmissionSettings,
}

impl SubmissionService {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        storage: Arc<dyn ObjectStorage>,
        content: Arc<dyn ContentClient>,
        notifier: Arc<dyn Notifier>,
        guard: RoleGuard,
        settings: SubmissionSettings,
    ) -> Self {
        Self {
            store,
            storage,
            content,
            notifier,
            guard,
            settings,
        }
    }

    pub fn guard(&self) -> &RoleGuard {
        &self.guard
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    pub fn content(&self) -> &Arc<dyn ContentClient> {
        &self.content
    }

    // ========================================================================
    // Guards
    // ========================================================================

    fn authorize(&self, identity: &Identity, permission: Permission) -> Result<()> {
        self.guard
            .require_permission(identity.role, permission)
            .map_err(|denied| {
                record_authorization_denial(&denied.requirement());
                warn!(
                    user_id = ?identity.user_id,
                    role = %identity.role,
                    required = %permission,
                    "Authorization denied"
                );
                AppError::from(denied)
            })
    }

    /// Owners see their own submissions; moderators see everything
    fn ensure_can_view(&self, identity: &Identity, submission: &Submission) -> Result<()> {
        if identity.is(&submission.owner_id) {
            return Ok(());
        }
        self.authorize(identity, Permission::Moderate)
    }

    async fn load(&self, id: i64) -> Result<Submission> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| AppError::SubmissionNotFound { id: id.to_string() })
    }

    fn page(&self, query: PageQuery) -> (u64, u64) {
        query.resolve(self.settings.page_size, self.settings.max_page_size)
    }

    // ========================================================================
    // Intake
    // ========================================================================

    /// Validate, upload and persist a new PENDING submission
    #[instrument(skip(self, identity, metadata, file), fields(user_id = ?identity.user_id))]
    pub async fn create(
        &self,
        identity: &Identity,
        metadata: SubmissionMetadata,
        file: FileUpload,
    ) -> Result<Submission> {
        let owner_id = identity.require_user()?.to_string();
        self.authorize(identity, Permission::Submit)?;

        let metadata = metadata.normalized();
        metadata.check()?;

        let policy = self.settings.file_policy.clone();
        let checked = file.clone();
        let sha256 = tokio::task::spawn_blocking(move || validate_file(&checked, &policy))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("file validation task failed: {}", e),
            })??;

        let prefix = format!(
            "{}/{}",
            self.settings.submissions_prefix,
            sanitize_file_name(&owner_id)
        );
        let key = self.storage.store(&prefix, &file).await?;

        let new = NewSubmission {
            owner_id: owner_id.clone(),
            owner_email: identity.email.clone(),
            title: metadata.title,
            abstract_text: metadata.abstract_text,
            authors: metadata.authors,
            keywords: metadata.keywords,
            research_domain: metadata.research_domain,
            file: StoredFile {
                key: key.clone(),
                name: file.file_name.clone(),
                content_type: file.content_type.clone(),
                size: file.size() as i64,
                sha256,
            },
        };

        let submission = self.store.insert(new).await.map_err(|e| {
            error!(error = %e, file_key = %key, "Submission not persisted; uploaded file left in storage");
            e
        })?;

        record_submission_created(&submission.research_domain);
        info!(submission_id = submission.id, file_key = %key, "Submission created");

        dispatch(
            self.notifier.clone(),
            Notification {
                user_id: owner_id,
                kind: NotificationKind::SubmissionReceived,
                title: "Submission received".to_string(),
                message: format!("Your submission \"{}\" is awaiting review.", submission.title),
                data: json!({ "submissionId": submission.id }),
            },
        );

        Ok(submission)
    }

    // ========================================================================
    // Moderation
    // ========================================================================

    pub async fn approve(&self, identity: &Identity, id: i64, comment: Option<String>) -> Result<Submission> {
        self.moderate(identity, id, SubmissionEvent::Approve, comment).await
    }

    pub async fn reject(&self, identity: &Identity, id: i64, comment: Option<String>) -> Result<Submission> {
        self.moderate(identity, id, SubmissionEvent::Reject, comment).await
    }

    pub async fn request_revision(
        &self,
        identity: &Identity,
        id: i64,
        comment: Option<String>,
    ) -> Result<Submission> {
        self.moderate(identity, id, SubmissionEvent::RequestRevision, comment).await
    }

    #[instrument(skip(self, identity, comment), fields(user_id = ?identity.user_id, event = %event))]
    async fn moderate(
        &self,
        identity: &Identity,
        id: i64,
        event: SubmissionEvent,
        comment: Option<String>,
    ) -> Result<Submission> {
        let actor_id = identity.require_user()?.to_string();
        if let Some(permission) = event.required_permission() {
            self.authorize(identity, permission)?;
        }

        let submission = self.load(id).await?;
        let next = transition(submission.status, event).map_err(|e| {
            record_transition(event.as_str(), "illegal");
            e
        })?;

        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if comment.is_none() && event != SubmissionEvent::Approve {
            return Err(AppError::validation("comment", "a comment is required"));
        }

        let publication_id = if event == SubmissionEvent::Approve {
            let draft = publication_draft(&submission, identity);
            match self.content.create_publication(&draft).await {
                Ok(created) => Some(created.publication_id),
                Err(e) => {
                    record_transition(event.as_str(), "downstream_failed");
                    error!(
                        submission_id = id,
                        error = %e,
                        "Publication creation failed; submission left unchanged"
                    );
                    return Err(e);
                }
            }
        } else {
            None
        };

        let change = StatusChange {
            submission_id: id,
            expected_version: submission.version,
            event,
            from: submission.status,
            to: next,
            actor_id,
            actor_email: identity.email.clone(),
            comment: comment.clone(),
            publication_id,
            at: Utc::now(),
        };

        let updated = match self.store.apply(change).await {
            Ok(updated) => updated,
            Err(e) => {
                record_transition(event.as_str(), "commit_failed");
                if let Some(publication_id) = publication_id {
                    error!(
                        submission_id = id,
                        publication_id,
                        error = %e,
                        "Publication created but submission status not committed"
                    );
                }
                return Err(e);
            }
        };

        record_transition(event.as_str(), "committed");
        info!(
            submission_id = id,
            from = %submission.status,
            to = %updated.status,
            publication_id = ?updated.publication_id,
            "Submission transitioned"
        );

        if let Some(notification) = moderation_notification(&updated, event, comment.as_deref()) {
            dispatch(self.notifier.clone(), notification);
        }

        Ok(updated)
    }

    /// Owner withdraws a submission that is still under review
    #[instrument(skip(self, identity), fields(user_id = ?identity.user_id))]
    pub async fn withdraw(&self, identity: &Identity, id: i64) -> Result<Submission> {
        let actor_id = identity.require_user()?.to_string();
        let submission = self.load(id).await?;

        if !identity.is(&submission.owner_id) {
            record_authorization_denial("OWNER");
            return Err(AppError::Forbidden {
                message: "only the owner can withdraw a submission".to_string(),
            });
        }

        let event = SubmissionEvent::Withdraw;
        let next = transition(submission.status, event).map_err(|e| {
            record_transition(event.as_str(), "illegal");
            e
        })?;

        let updated = self
            .store
            .apply(StatusChange {
                submission_id: id,
                expected_version: submission.version,
                event,
                from: submission.status,
                to: next,
                actor_id,
                actor_email: identity.email.clone(),
                comment: None,
                publication_id: None,
                at: Utc::now(),
            })
            .await?;

        record_transition(event.as_str(), "committed");
        info!(submission_id = id, "Submission withdrawn");
        Ok(updated)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, identity: &Identity, id: i64) -> Result<Submission> {
        identity.require_user()?;
        let submission = self.load(id).await?;
        self.ensure_can_view(identity, &submission)?;
        Ok(submission)
    }

    pub async fn list_mine(&self, identity: &Identity, query: PageQuery) -> Result<Page<Submission>> {
        let owner_id = identity.require_user()?;
        self.authorize(identity, Permission::ViewOwnSubmissions)?;
        let (page, size) = self.page(query);
        self.store.list_by_owner(owner_id, page, size).await
    }

    /// Moderation queue, oldest first
    pub async fn list_for_moderation(
        &self,
        identity: &Identity,
        status: Option<SubmissionStatus>,
        query: PageQuery,
    ) -> Result<Page<Submission>> {
        identity.require_user()?;
        self.authorize(identity, Permission::Moderate)?;
        let (page, size) = self.page(query);
        self.store.list_by_status(status, page, size).await
    }

    pub async fn history(&self, identity: &Identity, id: i64) -> Result<Vec<ModerationEvent>> {
        let submission = self.get(identity, id).await?;
        self.store.history(submission.id).await
    }

    pub async fn file_url(&self, identity: &Identity, id: i64) -> Result<FileLink> {
        let submission = self.get(identity, id).await?;
        let ttl = self.settings.signed_url_ttl;
        let url = self.storage.signed_url(&submission.file_key, ttl).await?;
        Ok(FileLink {
            url,
            file_name: submission.file_name,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
        })
    }
}

fn publication_draft(submission: &Submission, approver: &Identity) -> PublicationDraft {
    PublicationDraft {
        source_submission_id: submission.id,
        title: submission.title.clone(),
        abstract_text: submission.abstract_text.clone(),
        authors: submission.authors.clone(),
        keywords: submission.keywords.clone(),
        research_domain: submission.research_domain.clone(),
        file_key: submission.file_key.clone(),
        author_id: submission.owner_id.clone(),
        author_email: submission.owner_email.clone(),
        approved_by: approver
            .email
            .clone()
            .or_else(|| approver.user_id.clone())
            .unwrap_or_default(),
    }
}

fn moderation_notification(
    submission: &Submission,
    event: SubmissionEvent,
    comment: Option<&str>,
) -> Option<Notification> {
    let (kind, title, message) = match event {
        SubmissionEvent::Approve => (
            NotificationKind::SubmissionApproved,
            "Submission approved",
            format!("Your submission \"{}\" has been published.", submission.title),
        ),
        SubmissionEvent::Reject => (
            NotificationKind::SubmissionRejected,
            "Submission rejected",
            format!("Your submission \"{}\" was not accepted.", submission.title),
        ),
        SubmissionEvent::RequestRevision => (
            NotificationKind::RevisionRequested,
            "Revisions requested",
            format!("A reviewer asked for changes to \"{}\".", submission.title),
        ),
        SubmissionEvent::Withdraw => return None,
    };

    Some(Notification {
        user_id: submission.owner_id.clone(),
        kind,
        title: title.to_string(),
        message,
        data: json!({
            "submissionId": submission.id,
            "status": submission.status,
            "publicationId": submission.publication_id,
            "comment": comment,
        }),
    })
}

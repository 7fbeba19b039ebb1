//! In-memory submission store for tests and local runs without Postgres

use std::collections::BTreeMap;

use async_trait::async_trait;
use campuspress_common::db::Page;
use campuspress_common::Result;
use tokio::sync::RwLock;

use super::{
    ensure_legal, stale_version, ModerationEvent, NewSubmission, StatusChange, Submission,
    SubmissionStore,
};
use crate::workflow::SubmissionStatus;
use campuspress_common::AppError;

#[derive(Default)]
struct State {
    submissions: BTreeMap<i64, Submission>,
    events: Vec<ModerationEvent>,
    last_id: i64,
    last_event_id: i64,
}

/// Store keeping everything in process memory; ids start at 1
#[derive(Default)]
pub struct InMemorySubmissionStore {
    state: RwLock<State>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate(items: Vec<Submission>, page: u64, size: u64) -> Page<Submission> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.saturating_mul(size) as usize)
        .take(size as usize)
        .collect();
    Page::new(items, page, size, total)
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn insert(&self, new: NewSubmission) -> Result<Submission> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let now = chrono::Utc::now();

        let submission = Submission {
            id: state.last_id,
            owner_id: new.owner_id,
            owner_email: new.owner_email,
            title: new.title,
            abstract_text: new.abstract_text,
            authors: new.authors,
            keywords: new.keywords,
            research_domain: new.research_domain,
            file_key: new.file.key,
            file_name: new.file.name,
            file_content_type: new.file.content_type,
            file_size: new.file.size,
            file_sha256: new.file.sha256,
            status: SubmissionStatus::Pending,
            reviewer_email: None,
            review_comment: None,
            reviewed_at: None,
            publication_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find(&self, id: i64) -> Result<Option<Submission>> {
        Ok(self.state.read().await.submissions.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str, page: u64, size: u64) -> Result<Page<Submission>> {
        let state = self.state.read().await;
        let mine: Vec<Submission> = state
            .submissions
            .values()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(paginate(mine, page, size))
    }

    async fn list_by_status(
        &self,
        status: Option<SubmissionStatus>,
        page: u64,
        size: u64,
    ) -> Result<Page<Submission>> {
        let state = self.state.read().await;
        let matching: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        Ok(paginate(matching, page, size))
    }

    async fn apply(&self, change: StatusChange) -> Result<Submission> {
        ensure_legal(&change)?;
        let mut state = self.state.write().await;

        let submission = state
            .submissions
            .get_mut(&change.submission_id)
            .ok_or_else(|| AppError::SubmissionNotFound {
                id: change.submission_id.to_string(),
            })?;

        if submission.version != change.expected_version {
            return Err(stale_version(&change));
        }

        submission.status = change.to;
        submission.version += 1;
        submission.updated_at = change.at;
        if change.records_review() {
            submission.reviewer_email = Some(change.reviewer());
            submission.review_comment = change.comment.clone();
            submission.reviewed_at = Some(change.at);
        }
        if let Some(publication_id) = change.publication_id {
            submission.publication_id = Some(publication_id);
        }
        let updated = submission.clone();

        state.last_event_id += 1;
        let event = ModerationEvent {
            id: state.last_event_id,
            submission_id: change.submission_id,
            action: change.event,
            actor_id: change.actor_id,
            actor_email: change.actor_email,
            comment: change.comment,
            from_status: change.from,
            to_status: change.to,
            created_at: change.at,
        };
        state.events.push(event);

        Ok(updated)
    }

    async fn history(&self, submission_id: i64) -> Result<Vec<ModerationEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoredFile;
    use crate::workflow::SubmissionEvent;
    use chrono::Utc;

    fn new_submission(owner: &str) -> NewSubmission {
        NewSubmission {
            owner_id: owner.to_string(),
            owner_email: Some(format!("{}@univ.example", owner)),
            title: "Measuring lecture attendance".to_string(),
            abstract_text: "a".repeat(80),
            authors: vec!["Grace Hopper".to_string()],
            keywords: vec!["education".to_string()],
            research_domain: "Education".to_string(),
            file: StoredFile {
                key: format!("submissions/{}/k-paper.pdf", owner),
                name: "paper.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 10,
                sha256: "00".repeat(32),
            },
        }
    }

    fn change(submission: &Submission, event: SubmissionEvent, to: SubmissionStatus) -> StatusChange {
        StatusChange {
            submission_id: submission.id,
            expected_version: submission.version,
            event,
            from: submission.status,
            to,
            actor_id: "staff-1".to_string(),
            actor_email: Some("staff@univ.example".to_string()),
            comment: Some("Looks good".to_string()),
            publication_id: None,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_apply_bumps_version_and_records_event() {
        let store = InMemorySubmissionStore::new();
        let created = store.insert(new_submission("u-1")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.version, 0);

        let updated = store
            .apply(change(&created, SubmissionEvent::RequestRevision, SubmissionStatus::InReview))
            .await
            .unwrap();
        assert_eq!(updated.status, SubmissionStatus::InReview);
        assert_eq!(updated.version, 1);
        assert_eq!(updated.reviewer_email.as_deref(), Some("staff@univ.example"));

        let history = store.history(created.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, SubmissionStatus::Pending);
        assert_eq!(history[0].to_status, SubmissionStatus::InReview);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = InMemorySubmissionStore::new();
        let created = store.insert(new_submission("u-1")).await.unwrap();

        let approve = change(&created, SubmissionEvent::Approve, SubmissionStatus::Validated);
        let reject = change(&created, SubmissionEvent::Reject, SubmissionStatus::Rejected);

        store.apply(approve).await.unwrap();
        let err = store.apply(reject).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let stored = store.find(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Validated);
        assert_eq!(store.history(created.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_outside_workflow_is_refused() {
        let store = InMemorySubmissionStore::new();
        let created = store.insert(new_submission("u-1")).await.unwrap();

        let backwards = change(&created, SubmissionEvent::Approve, SubmissionStatus::Pending);
        let err = store.apply(backwards).await.unwrap_err();
        assert!(matches!(err, AppError::IllegalStateTransition { .. }));

        let stored = store.find(created.id).await.unwrap().unwrap();
        assert_eq!(stored, created);
        assert!(store.history(created.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_order_and_pages() {
        let store = InMemorySubmissionStore::new();
        for owner in ["u-1", "u-2", "u-1", "u-1"] {
            store.insert(new_submission(owner)).await.unwrap();
        }

        let mine = store.list_by_owner("u-1", 0, 2).await.unwrap();
        assert_eq!(mine.total, 3);
        assert_eq!(mine.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![4, 3]);

        let queue = store.list_by_status(Some(SubmissionStatus::Pending), 1, 3).await.unwrap();
        assert_eq!(queue.total, 4);
        assert_eq!(queue.items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![4]);
    }
}

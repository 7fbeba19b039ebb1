//! Owner notifications
//!
//! Delivery is best effort: [`notify_best_effort`] logs and counts failures
//! and never hands them back to the workflow. [`dispatch`] runs it on a
//! background task so callers return as soon as their change is committed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campuspress_common::metrics::record_notification_failure;
use campuspress_common::{AppError, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    SubmissionReceived,
    SubmissionApproved,
    SubmissionRejected,
    RevisionRequested,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SubmissionReceived => "SUBMISSION_RECEIVED",
            NotificationKind::SubmissionApproved => "SUBMISSION_APPROVED",
            NotificationKind::SubmissionRejected => "SUBMISSION_REJECTED",
            NotificationKind::RevisionRequested => "REVISION_REQUESTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Send a notification, swallowing any failure
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.notify(&notification).await {
        record_notification_failure(notification.kind.as_str());
        warn!(
            error = %e,
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            "Notification delivery failed"
        );
    }
}

/// Deliver in the background; the caller never waits on the notifier
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) -> JoinHandle<()> {
    tokio::spawn(
        async move { notify_best_effort(notifier.as_ref(), notification).await }
            .in_current_span(),
    )
}

/// Posts notifications to the notification service
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    internal_token: Option<String>,
}

impl HttpNotifier {
    pub fn new(base_url: &str, internal_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            internal_token,
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/internal/notifications", self.base_url);

        let mut request = self.client.post(&url).json(notification);
        if let Some(ref token) = self.internal_token {
            request = request.header(campuspress_common::auth::INTERNAL_TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream {
                service: "notification-service".to_string(),
                message: format!("responded with {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Writes notifications to the log; used when no notification service is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every notification it is asked to send; can be told to fail
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: tokio::sync::Mutex<Vec<Notification>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        notifier
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Wait until at least `count` notifications arrived, giving up after two seconds
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable {
                message: "notification service down".to_string(),
            });
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

//! Client for the content service's publication handoff

use std::time::Duration;

use async_trait::async_trait;
use campuspress_common::auth::INTERNAL_TOKEN_HEADER;
use campuspress_common::metrics::record_downstream_error;
use campuspress_common::publication::{
    PublicationCreated, PublicationDraft, CREATE_PUBLICATION_PATH,
};
use campuspress_common::{AppError, Result};
use tracing::{debug, instrument};

const SERVICE: &str = "content-service";

#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Create (or find) the publication for an approved submission
    async fn create_publication(&self, draft: &PublicationDraft) -> Result<PublicationCreated>;

    /// Cheap reachability check for readiness probes
    async fn ping(&self) -> Result<()>;
}

fn upstream(message: impl Into<String>) -> AppError {
    record_downstream_error(SERVICE, "create_publication");
    AppError::Upstream {
        service: SERVICE.to_string(),
        message: message.into(),
    }
}

pub struct HttpContentClient {
    client: reqwest::Client,
    base_url: String,
    internal_token: Option<String>,
}

impl HttpContentClient {
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
impl ContentClient for HttpContentClient {
    #[instrument(skip(self, draft), fields(submission_id = draft.source_submission_id))]
    async fn create_publication(&self, draft: &PublicationDraft) -> Result<PublicationCreated> {
        let url = format!("{}{}", self.base_url, CREATE_PUBLICATION_PATH);

        let mut request = self.client.post(&url).json(draft);
        if let Some(ref token) = self.internal_token {
            request = request.header(INTERNAL_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| upstream(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(upstream(format!("responded with {}: {}", status, body)));
        }

        let created: PublicationCreated = response
            .json()
            .await
            .map_err(|e| upstream(format!("unreadable response: {}", e)))?;

        debug!(
            publication_id = created.publication_id,
            deduplicated = created.deduplicated,
            "Publication created"
        );
        Ok(created)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable {
                message: format!("{} health returned {}", SERVICE, response.status()),
            })
        }
    }
}

/// Content client answering from a fixed script; records every draft it sees
#[cfg(test)]
pub struct StubContentClient {
    next: tokio::sync::Mutex<std::result::Result<i64, String>>,
    drafts: tokio::sync::Mutex<Vec<PublicationDraft>>,
}

#[cfg(test)]
impl StubContentClient {
    pub fn returning(publication_id: i64) -> Self {
        Self {
            next: tokio::sync::Mutex::new(Ok(publication_id)),
            drafts: Default::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            next: tokio::sync::Mutex::new(Err(message.to_string())),
            drafts: Default::default(),
        }
    }

    pub async fn succeed_with(&self, publication_id: i64) {
        *self.next.lock().await = Ok(publication_id);
    }

    pub async fn drafts(&self) -> Vec<PublicationDraft> {
        self.drafts.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ContentClient for StubContentClient {
    async fn create_publication(&self, draft: &PublicationDraft) -> Result<PublicationCreated> {
        self.drafts.lock().await.push(draft.clone());
        match &*self.next.lock().await {
            Ok(id) => Ok(PublicationCreated {
                publication_id: *id,
                deduplicated: false,
            }),
            Err(message) => Err(upstream(message.clone())),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_content_service_is_upstream_error() {
        let client =
            HttpContentClient::new("http://127.0.0.1:9/", None, Duration::from_millis(200)).unwrap();
        let draft = PublicationDraft {
            source_submission_id: 1,
            title: "Title of the work".to_string(),
            abstract_text: "Abstract".to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            keywords: vec![],
            research_domain: "Mathematics".to_string(),
            file_key: "submissions/u-1/k-a.pdf".to_string(),
            author_id: "u-1".to_string(),
            author_email: None,
            approved_by: "staff@univ.example".to_string(),
        };

        let err = client.create_publication(&draft).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }
}

//! Persistence for published works
//!
//! Provides:
//! - SeaORM entity model
//! - The [`PublicationStore`] seam with a Postgres repository and an in-memory store

mod memory;
pub mod models;
mod repository;

pub use memory::InMemoryPublicationStore;
pub use repository::PublicationRepository;

use async_trait::async_trait;
use campuspress_common::db::Page;
use campuspress_common::publication::PublicationDraft;
use campuspress_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub id: i64,
    pub source_submission_id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub research_domain: String,
    pub file_key: String,
    pub author_id: String,
    pub author_email: Option<String>,
    pub approved_by: String,
    pub published_at: DateTime<Utc>,
}

/// Outcome of [`PublicationStore::publish`]
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub publication: Publication,
    /// False when a publication for the same submission already existed
    pub created: bool,
}

/// Storage seam for publications
#[async_trait]
pub trait PublicationStore: Send + Sync {
    /// Create a publication, or return the one already created for
    /// `draft.source_submission_id`.
    async fn publish(&self, draft: PublicationDraft) -> Result<Published>;

    async fn find(&self, id: i64) -> Result<Option<Publication>>;

    /// Newest first, optionally restricted to one research domain
    async fn list(&self, domain: Option<&str>, page: u64, size: u64) -> Result<Page<Publication>>;

    async fn ping(&self) -> Result<()>;
}

/// Domains match ignoring case and surrounding whitespace
pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

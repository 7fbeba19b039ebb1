//! Contract between the submission workflow and the content service
//!
//! The submission service posts a [`PublicationDraft`] when a submission is
//! approved; the content service answers with [`PublicationCreated`]. Drafts
//! are keyed by `source_submission_id`, so re-sending one for the same
//! submission returns the existing publication instead of creating another.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Internal route the content service exposes for the handoff
pub const CREATE_PUBLICATION_PATH: &str = "/internal/publications";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PublicationDraft {
    #[validate(range(min = 1))]
    pub source_submission_id: i64,

    #[validate(length(min = 1, max = 300))]
    pub title: String,

    #[serde(rename = "abstract")]
    #[validate(length(min = 1))]
    pub abstract_text: String,

    #[validate(length(min = 1))]
    pub authors: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[validate(length(min = 1, max = 100))]
    pub research_domain: String,

    pub file_key: String,

    pub author_id: String,

    #[serde(default)]
    pub author_email: Option<String>,

    /// Email (or id) of the staff member who approved the submission
    pub approved_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationCreated {
    pub publication_id: i64,

    /// True when a publication for the same submission already existed
    #[serde(default)]
    pub deduplicated: bool,
}

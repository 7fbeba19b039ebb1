//! Intake validation for submission metadata and files
//!
//! Both checks run before anything is uploaded.

use campuspress_common::config::SubmissionConfig;
use campuspress_common::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::{Validate, ValidationError, ValidationErrors};

use super::storage::FileUpload;

/// Metadata part of a submission upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    #[validate(length(min = 10, max = 300, message = "title must be between 10 and 300 characters"))]
    pub title: String,

    #[serde(rename = "abstract", alias = "abstractText")]
    #[validate(length(min = 50, max = 5000, message = "abstract must be between 50 and 5000 characters"))]
    pub abstract_text: String,

    #[validate(
        length(min = 1, max = 20, message = "between 1 and 20 authors are required"),
        custom(function = "validate_authors")
    )]
    pub authors: Vec<String>,

    #[validate(
        length(min = 1, max = 10, message = "between 1 and 10 keywords are required"),
        custom(function = "validate_keywords")
    )]
    pub keywords: Vec<String>,

    #[validate(length(min = 2, max = 100, message = "research domain must be between 2 and 100 characters"))]
    pub research_domain: String,
}

fn check_items(items: &[String], min: usize, max: usize, code: &'static str, message: &'static str) -> std::result::Result<(), ValidationError> {
    let ok = items.iter().all(|item| {
        let len = item.chars().count();
        (min..=max).contains(&len)
    });
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(code).with_message(message.into()))
    }
}

fn validate_authors(authors: &Vec<String>) -> std::result::Result<(), ValidationError> {
    check_items(authors, 2, 120, "author_length", "each author must be between 2 and 120 characters")
}

fn validate_keywords(keywords: &Vec<String>) -> std::result::Result<(), ValidationError> {
    check_items(keywords, 2, 50, "keyword_length", "each keyword must be between 2 and 50 characters")
}

/// Field order used when reporting the first failure
const FIELD_ORDER: [&str; 5] = ["title", "abstract_text", "authors", "keywords", "research_domain"];

fn first_failure(errors: &ValidationErrors) -> AppError {
    let fields = errors.field_errors();
    for field in FIELD_ORDER {
        if let Some(error) = fields.get(field).and_then(|list| list.first()) {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            let field = if field == "abstract_text" { "abstract" } else { field };
            return AppError::validation(field, message);
        }
    }
    AppError::from(errors.clone())
}

impl SubmissionMetadata {
    /// Trim surrounding whitespace everywhere
    pub fn normalized(self) -> Self {
        let trim_all = |items: Vec<String>| -> Vec<String> {
            items.into_iter().map(|item| item.trim().to_string()).collect()
        };
        Self {
            title: self.title.trim().to_string(),
            abstract_text: self.abstract_text.trim().to_string(),
            authors: trim_all(self.authors),
            keywords: trim_all(self.keywords),
            research_domain: self.research_domain.trim().to_string(),
        }
    }

    /// Validate bounds, reporting the first offending field
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|errors| first_failure(&errors))
    }
}

/// Limits applied to uploaded files
#[derive(Debug, Clone)]
pub struct FilePolicy {
    pub max_bytes: usize,
    pub allowed_content_types: Vec<String>,
}

impl From<&SubmissionConfig> for FilePolicy {
    fn from(config: &SubmissionConfig) -> Self {
        Self {
            max_bytes: config.max_file_bytes,
            allowed_content_types: config
                .allowed_content_types
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for FilePolicy {
    fn default() -> Self {
        Self::from(&SubmissionConfig::default())
    }
}

/// Media type without parameters, lower-cased
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Check a file against the policy and return its SHA-256 digest (hex).
///
/// Parses the whole document, so callers on the async runtime should run it
/// on a blocking thread.
pub fn validate_file(file: &FileUpload, policy: &FilePolicy) -> Result<String> {
    if file.bytes.is_empty() {
        return Err(AppError::validation("file", "file is empty"));
    }
    if file.size() > policy.max_bytes {
        return Err(AppError::PayloadTooLarge {
            size: file.size(),
            limit: policy.max_bytes,
        });
    }

    let content_type = essence(&file.content_type);
    if !policy.allowed_content_types.iter().any(|t| *t == content_type) {
        return Err(AppError::validation(
            "file",
            format!("unsupported file type '{}', expected one of {:?}", content_type, policy.allowed_content_types),
        ));
    }

    if content_type == "application/pdf" {
        if !file.bytes.starts_with(PDF_MAGIC) {
            return Err(AppError::validation("file", "file is not a PDF document"));
        }
        let document = lopdf::Document::load_mem(&file.bytes)
            .map_err(|e| AppError::validation("file", format!("unreadable PDF document: {}", e)))?;
        if document.get_pages().is_empty() {
            return Err(AppError::validation("file", "PDF document has no pages"));
        }
    }

    Ok(hex::encode(Sha256::digest(&file.bytes)))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{metadata, sample_pdf};
    use super::*;
    use axum::body::Bytes;

    fn upload(bytes: Vec<u8>, content_type: &str) -> FileUpload {
        FileUpload {
            file_name: "paper.pdf".to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(bytes),
        }
    }

    fn field_of(err: AppError) -> Option<String> {
        match err {
            AppError::Validation { field, .. } => field,
            _ => None,
        }
    }

    #[test]
    fn test_valid_metadata() {
        assert!(metadata().check().is_ok());
    }

    #[test]
    fn test_short_title_rejected() {
        let meta = SubmissionMetadata {
            title: "Short".to_string(),
            ..metadata()
        };
        let err = meta.check().unwrap_err();
        assert!(err.to_string().contains("title must be between 10 and 300 characters"));
        assert_eq!(field_of(err).as_deref(), Some("title"));
    }

    #[test]
    fn test_list_bounds() {
        let meta = SubmissionMetadata {
            authors: vec![],
            ..metadata()
        };
        assert_eq!(field_of(meta.check().unwrap_err()).as_deref(), Some("authors"));

        let meta = SubmissionMetadata {
            authors: vec!["A".to_string()],
            ..metadata()
        };
        assert!(meta.check().unwrap_err().to_string().contains("each author"));

        let meta = SubmissionMetadata {
            keywords: (0..11).map(|i| format!("kw{}", i)).collect(),
            ..metadata()
        };
        assert_eq!(field_of(meta.check().unwrap_err()).as_deref(), Some("keywords"));
    }

    #[test]
    fn test_normalized_trims_before_counting() {
        let meta = SubmissionMetadata {
            title: "   Tiny    ".to_string(),
            ..metadata()
        }
        .normalized();
        assert_eq!(meta.title, "Tiny");
        assert!(meta.check().is_err());
    }

    #[test]
    fn test_metadata_accepts_abstract_key() {
        let json = serde_json::json!({
            "title": "Urban heat islands on a university campus",
            "abstract": "x".repeat(60),
            "authors": ["Ada Lovelace"],
            "keywords": ["climate"],
            "researchDomain": "Environmental science"
        });
        let meta: SubmissionMetadata = serde_json::from_value(json).unwrap();
        assert!(meta.check().is_ok());
    }

    #[test]
    fn test_valid_pdf_digest() {
        let bytes = sample_pdf();
        let digest = validate_file(&upload(bytes.clone(), "application/pdf"), &FilePolicy::default()).unwrap();
        assert_eq!(digest, hex::encode(Sha256::digest(&bytes)));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_file_rejections() {
        let policy = FilePolicy::default();

        assert!(validate_file(&upload(vec![], "application/pdf"), &policy).is_err());

        let err = validate_file(&upload(sample_pdf(), "image/png"), &policy).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));

        let err = validate_file(&upload(b"hello world".to_vec(), "application/pdf"), &policy).unwrap_err();
        assert!(err.to_string().contains("not a PDF"));

        let err = validate_file(&upload(b"%PDF-1.4 garbage".to_vec(), "application/pdf"), &policy).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_size_limit_and_content_type_parameters() {
        let policy = FilePolicy {
            max_bytes: 16,
            ..FilePolicy::default()
        };
        let err = validate_file(&upload(sample_pdf(), "application/pdf"), &policy).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 16, .. }));

        assert!(validate_file(&upload(sample_pdf(), "Application/PDF; qs=0.9"), &FilePolicy::default()).is_ok());
    }
}

//! Submission service components

pub mod content_client;
pub mod notifier;
pub mod storage;
pub mod submissions;
pub mod validation;

pub use content_client::{ContentClient, HttpContentClient};
pub use notifier::{HttpNotifier, LogNotifier, Notifier};
pub use storage::{InMemoryStorage, ObjectStorage, S3Storage};
pub use submissions::{SubmissionService, SubmissionSettings};

//! Object storage for submission files
//!
//! Production uses an S3-compatible bucket (Cloudflare R2); local runs and
//! tests use [`InMemoryStorage`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use axum::body::Bytes;
use campuspress_common::config::StorageConfig;
use campuspress_common::metrics::record_downstream_error;
use campuspress_common::{AppError, Result};
use regex_lite::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// A validated file ready to be stored
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the file under `prefix` and return its opaque key
    async fn store(&self, prefix: &str, file: &FileUpload) -> Result<String>;

    /// Time-limited download URL for a stored object
    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static pattern"))
}

/// Reduce a client-supplied file name to a safe key segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars().replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c| c == '_' || c == '.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

/// `{prefix}/{uuid}-{sanitized name}`
pub fn object_key(prefix: &str, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        prefix.trim_end_matches('/'),
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn storage_error(operation: &str, err: impl std::fmt::Display) -> AppError {
    record_downstream_error("object-storage", operation);
    AppError::Storage {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

/// S3-compatible storage (Cloudflare R2, MinIO, AWS S3)
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client from configuration. Static credentials and a custom
    /// endpoint are used when present; otherwise the default AWS chain applies.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "campuspress-config",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(bucket = %config.bucket, endpoint = ?config.endpoint, "S3 storage configured");
        Ok(Self::new(S3Client::from_conf(s3_config), config.bucket.clone()))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[instrument(skip(self, file), fields(bucket = %self.bucket, size = file.size()))]
    async fn store(&self, prefix: &str, file: &FileUpload) -> Result<String> {
        let key = object_key(prefix, &file.file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&file.content_type)
            .body(ByteStream::from(file.bytes.clone()))
            .send()
            .await
            .map_err(|e| storage_error("upload", e))?;

        debug!(%key, "Object stored");
        Ok(key)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| storage_error("presign", e))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("presign", e))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("delete", e))?;
        Ok(())
    }
}

/// Process-local storage; can be told to fail uploads
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, FileUpload>>,
    store_calls: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl InMemoryStorage {
    /// Number of `store` calls made, including failed ones
    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<FileUpload> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn store(&self, prefix: &str, file: &FileUpload) -> Result<String> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(storage_error("upload", "storage unavailable"));
        }

        let key = object_key(prefix, &file.file_name);
        self.objects.write().await.insert(key.clone(), file.clone());
        Ok(key)
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(AppError::NotFound {
                resource_type: "object".to_string(),
                id: key.to_string(),
            });
        }
        let expires = chrono::Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        Ok(format!("memory://{}?expires={}", key, expires.timestamp()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

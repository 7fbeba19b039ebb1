//! Configuration management for CampusPress services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/<service>, config/<APP_ENV>)
//! - Default values, with listen ports that differ per [`Service`]

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The CampusPress binaries. Each listens on its own default ports so a
/// local run of all three needs no configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Gateway,
    Submission,
    Content,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Gateway => "gateway",
            Service::Submission => "submission",
            Service::Content => "content",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Service::Gateway => 8080,
            Service::Submission => 8081,
            Service::Content => 8082,
        }
    }

    pub fn default_metrics_port(&self) -> u16 {
        match self {
            Service::Gateway => 9090,
            Service::Submission => 9091,
            Service::Content => 9092,
        }
    }

    /// Value of the `service` label on exported metrics
    pub fn service_name(&self) -> String {
        format!("campuspress-{}", self.name())
    }

    fn local_url(&self) -> String {
        format!("http://localhost:{}", self.default_port())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Object storage configuration
    pub storage: StorageConfig,

    /// Downstream service locations
    pub services: ServicesConfig,

    /// Submission intake limits
    pub submission: SubmissionConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    pub max_connections: u32,

    /// Minimum number of connections
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret for verifying bearer tokens at the gateway
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `s3` for an S3-compatible bucket (Cloudflare R2), `memory` for local runs
    pub backend: String,

    /// Endpoint URL, e.g. https://<account>.r2.cloudflarestorage.com
    pub endpoint: Option<String>,

    /// Bucket name
    pub bucket: String,

    /// Region; R2 uses `auto`
    pub region: String,

    pub access_key_id: Option<String>,

    pub secret_access_key: Option<String>,

    /// Key prefix for submission files
    pub submissions_prefix: String,

    /// Lifetime of signed download URLs
    pub signed_url_ttl_minutes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Submission service base URL
    pub submission_url: String,

    /// Content service base URL
    pub content_url: String,

    /// Notification service base URL; notifications are only logged when unset
    pub notification_url: Option<String>,

    /// Shared secret for internal endpoints
    pub internal_token: Option<String>,

    /// Timeout for calls to other services, in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Largest accepted file, in bytes
    pub max_file_bytes: usize,

    /// Accepted file content types
    pub allowed_content_types: Vec<String>,

    /// Default page size for listings
    pub page_size: u64,

    /// Upper bound on requested page sizes
    pub max_page_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full filter directive
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    pub metrics_port: u16,

    /// Service name for tracing
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second
    pub requests_per_second: u32,

    /// Burst capacity
    pub burst: u32,

    /// Enable rate limiting
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: Service::Gateway.default_port(),
            request_timeout_secs: 30,
            max_body_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/campuspress".to_string(),
            read_url: None,
            max_connections: 50,
            min_connections: 5,
            connect_timeout_secs: 10,
            idle_timeout_secs: 300,
            run_migrations: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: 3600,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            endpoint: None,
            bucket: "campuspress".to_string(),
            region: "auto".to_string(),
            access_key_id: None,
            secret_access_key: None,
            submissions_prefix: "submissions".to_string(),
            signed_url_ttl_minutes: 15,
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            submission_url: Service::Submission.local_url(),
            content_url: Service::Content.local_url(),
            notification_url: None,
            internal_token: None,
            request_timeout_secs: 10,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            allowed_content_types: vec!["application/pdf".to_string()],
            page_size: 20,
            max_page_size: 100,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: true,
            metrics_port: Service::Gateway.default_metrics_port(),
            service_name: "campuspress".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 50,
            burst: 100,
            enabled: true,
        }
    }
}

impl AppConfig {
    /// Built-in defaults for one binary
    pub fn for_service(service: Service) -> Self {
        let mut config = Self::default();
        config.server.port = service.default_port();
        config.observability.metrics_port = service.default_metrics_port();
        config.observability.service_name = service.service_name();
        config
    }

    fn service_defaults(service: Service) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.port", i64::from(service.default_port()))?
            .set_default(
                "observability.metrics_port",
                i64::from(service.default_metrics_port()),
            )?
            .set_default("observability.service_name", service.service_name())
    }

    /// Load configuration for `service` from files and environment
    pub fn load(service: Service) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Self::service_defaults(service)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load per-service config
            .add_source(File::with_name(&format!("config/{}", service.name())).required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8083
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("submission.allowed_content_types")
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Timeout for service-to-service calls
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.services.request_timeout_secs)
    }

    /// Lifetime of signed file URLs
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.signed_url_ttl_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.submission.max_file_bytes, 20 * 1024 * 1024);
        assert_eq!(config.submission.allowed_content_types, vec!["application/pdf"]);
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_services_listen_on_distinct_ports() {
        let services = [Service::Gateway, Service::Submission, Service::Content];
        let configs: Vec<AppConfig> = services.iter().map(|s| AppConfig::for_service(*s)).collect();

        for (i, a) in configs.iter().enumerate() {
            for b in &configs[i + 1..] {
                assert_ne!(a.server.port, b.server.port);
                assert_ne!(a.observability.metrics_port, b.observability.metrics_port);
                assert_ne!(a.server.port, b.observability.metrics_port);
            }
        }

        let gateway = &configs[0];
        assert_eq!(
            gateway.services.submission_url,
            format!("http://localhost:{}", configs[1].server.port)
        );
        assert_eq!(
            gateway.services.content_url,
            format!("http://localhost:{}", configs[2].server.port)
        );
        assert_eq!(configs[2].observability.service_name, "campuspress-content");
    }

    #[test]
    fn test_service_defaults_sit_under_overrides() {
        let config: AppConfig = AppConfig::service_defaults(Service::Content)
            .unwrap()
            .set_override("observability.metrics_port", 9300_i64)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8082);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.observability.metrics_port, 9300);
        assert_eq!(config.observability.service_name, "campuspress-content");
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("server.port", 9001_i64)
            .unwrap()
            .set_override("services.content_url", "http://content:8080")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.services.content_url, "http://content:8080");
        assert_eq!(config.services.request_timeout_secs, 10);
        assert!(config.rate_limit.enabled);
    }
}

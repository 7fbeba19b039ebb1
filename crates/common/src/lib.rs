//! CampusPress Common Library
//!
//! Shared code for all CampusPress services including:
//! - Role/permission model and authorization guard
//! - Caller identity and bearer tokens
//! - Error types and handling
//! - Configuration management
//! - Database connection pool
//! - Metrics, logging and telemetry setup
//! - The submission-to-publication contract

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod publication;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{Identity, Permission, Role, RoleGuard, RolePermissionMap};
pub use config::AppConfig;
pub use db::DbPool;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

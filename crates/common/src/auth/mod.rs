//! Authentication and authorization
//!
//! Provides:
//! - Permission catalog and roles
//! - The immutable role-to-permission map and the authorization guard
//! - Identity extraction from gateway-verified headers
//! - JWT token issuing and verification (gateway side)

mod guard;
mod permission;
mod policy;
mod role;

pub use guard::{AuthzError, RoleGuard};
pub use permission::{Permission, UnknownPermission};
pub use policy::RolePermissionMap;
pub use role::{resolve_role, Role};

use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Header carrying the verified user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the verified user email
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Header carrying the role hint
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Shared secret between internal services
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Caller identity as established by the gateway.
///
/// Services trust these headers: the gateway strips any client-supplied
/// copies and sets them only after verifying the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            email: None,
            role: Role::Viewer,
        }
    }

    pub fn user(user_id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: Some(email.into()),
            role,
        }
    }

    /// The user id, or 401 for anonymous callers
    pub fn require_user(&self) -> Result<&str> {
        self.user_id.as_deref().ok_or_else(|| AppError::Unauthorized {
            message: "Missing X-User-Id header".to_string(),
        })
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Axum extractor for Identity
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let user_id = header_value(parts, USER_ID_HEADER);
        let email = header_value(parts, USER_EMAIL_HEADER);
        let role = resolve_role(header_value(parts, USER_ROLE_HEADER).as_deref());

        let span = tracing::Span::current();
        if let Some(ref id) = user_id {
            span.record("user_id", id.as_str());
        }
        span.record("role", role.as_str());

        Ok(Identity { user_id, email, role })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Role hint, resolved with [`resolve_role`] on use
    #[serde(default)]
    pub role: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl TokenClaims {
    pub fn role(&self) -> Role {
        resolve_role(self.role.as_deref())
    }
}

/// JWT token manager
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl TokenManager {
    /// Create a new token manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Issue a new token
    pub fn issue(&self, user_id: &str, email: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = TokenClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            role: Some(role.as_str().to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to generate token: {}", e)
            })
    }

    /// Validate and decode a token
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::ExpiredToken
                    }
                    _ => AppError::InvalidToken,
                }
            })
    }
}

/// Extract the token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn identity_from(headers: &[(&str, &str)]) -> Identity {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let identity = identity_from(&[
            ("X-User-Id", "u-42"),
            ("X-User-Email", "ada@univ.example"),
            ("X-User-Role", "personnel"),
        ])
        .await;

        assert_eq!(identity, Identity::user("u-42", "ada@univ.example", Role::Staff));
        assert_eq!(identity.require_user().unwrap(), "u-42");
    }

    #[tokio::test]
    async fn test_missing_headers_are_anonymous_viewer() {
        let identity = identity_from(&[]).await;
        assert_eq!(identity, Identity::anonymous());
        assert!(matches!(identity.require_user(), Err(AppError::Unauthorized { .. })));

        let identity = identity_from(&[("X-User-Id", "  "), ("X-User-Role", "wizard")]).await;
        assert_eq!(identity.user_id, None);
        assert_eq!(identity.role, Role::Viewer);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_token_roundtrip() {
        let manager = TokenManager::new("test_secret", 3600);

        let token = manager.issue("u-1", "grace@univ.example", Role::Student).unwrap();
        let claims = manager.verify(&token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.email.as_deref(), Some("grace@univ.example"));
        assert_eq!(claims.role(), Role::Student);
    }

    #[test]
    fn test_token_with_wrong_secret_is_invalid() {
        let issuer = TokenManager::new("secret-a", 3600);
        let verifier = TokenManager::new("secret-b", 3600);

        let token = issuer.issue("u-1", "grace@univ.example", Role::Admin).unwrap();
        assert!(matches!(verifier.verify(&token), Err(AppError::InvalidToken)));
        assert!(matches!(verifier.verify("garbage"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        // jsonwebtoken allows 60s of leeway by default
        let manager = TokenManager {
            expiration_secs: -120,
            ..TokenManager::new("test_secret", 0)
        };
        let token = manager.issue("u-1", "grace@univ.example", Role::Student).unwrap();
        assert!(matches!(manager.verify(&token), Err(AppError::ExpiredToken)));
    }
}

//! Caller authentication at the edge
//!
//! Services behind the gateway trust the `X-User-*` headers, so whatever the
//! client sent is dropped and only values taken from a verified token are
//! forwarded.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use campuspress_common::{
    auth::{
        extract_bearer, TokenClaims, INTERNAL_TOKEN_HEADER, USER_EMAIL_HEADER,
        USER_ID_HEADER, USER_ROLE_HEADER,
    },
    errors::{AppError, Result},
};
use tracing::{debug, warn, Span};

use crate::AppState;

const TRUSTED_HEADERS: [&str; 4] = [
    USER_ID_HEADER,
    USER_EMAIL_HEADER,
    USER_ROLE_HEADER,
    INTERNAL_TOKEN_HEADER,
];

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| AppError::InvalidToken)
}

/// Replace identity headers with the claims of a verified token
fn apply_claims(headers: &mut HeaderMap, claims: &TokenClaims) -> Result<()> {
    let role = claims.role();
    headers.insert(USER_ID_HEADER, header_value(&claims.sub)?);
    if let Some(ref email) = claims.email {
        headers.insert(USER_EMAIL_HEADER, header_value(email)?);
    }
    headers.insert(USER_ROLE_HEADER, header_value(role.as_str())?);

    let span = Span::current();
    span.record("user_id", claims.sub.as_str());
    span.record("role", role.as_str());
    Ok(())
}

/// Strip client-supplied identity headers and verify the bearer token, if any.
///
/// Requests without `Authorization` continue anonymously; a malformed,
/// invalid or expired token is rejected with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let headers = request.headers_mut();
    for name in TRUSTED_HEADERS {
        if headers.remove(name).is_some() {
            debug!(header = name, "Dropped client-supplied identity header");
        }
    }

    if let Some(raw) = headers.remove(AUTHORIZATION) {
        let token = raw
            .to_str()
            .ok()
            .and_then(extract_bearer)
            .ok_or_else(|| AppError::Unauthorized {
                message: "expected a Bearer token".to_string(),
            })?;

        let claims = state.tokens.verify(token).map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            e
        })?;
        apply_claims(headers, &claims)?;
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn claims(role: Option<&str>) -> TokenClaims {
        TokenClaims {
            sub: "u-1".to_string(),
            email: Some("ada@univ.example".to_string()),
            role: role.map(str::to_string),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_claims_resolve_role_aliases() {
        let mut headers = HeaderMap::new();
        assert_ok!(apply_claims(&mut headers, &claims(Some("ROLE_ETUDIANT"))));
        assert_eq!(headers[USER_ID_HEADER], "u-1");
        assert_eq!(headers[USER_EMAIL_HEADER], "ada@univ.example");
        assert_eq!(headers[USER_ROLE_HEADER], "STUDENT");
    }

    #[test]
    fn test_missing_role_claim_is_viewer() {
        let mut headers = HeaderMap::new();
        assert_ok!(apply_claims(&mut headers, &claims(None)));
        assert_eq!(headers[USER_ROLE_HEADER], "VIEWER");
    }

    #[test]
    fn test_unprintable_subject_is_rejected() {
        let mut bad = claims(Some("STAFF"));
        bad.sub = "u-1\nX-User-Role: ADMIN".to_string();
        let mut headers = HeaderMap::new();
        let err = assert_err!(apply_claims(&mut headers, &bad));
        assert!(matches!(err, AppError::InvalidToken));
        assert!(headers.get(USER_ROLE_HEADER).is_none());
    }
}

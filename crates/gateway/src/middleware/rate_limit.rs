//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use campuspress_common::errors::{AppError, Result};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::AppState;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter; both values must be non-zero
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> Result<Arc<GlobalRateLimiter>> {
    let invalid = |what: &str| AppError::Configuration {
        message: format!("rate_limit.{} must be greater than zero", what),
    };
    let rps = NonZeroU32::new(requests_per_second).ok_or_else(|| invalid("requests_per_second"))?;
    let burst = NonZeroU32::new(burst).ok_or_else(|| invalid("burst"))?;

    Ok(Arc::new(RateLimiter::direct(Quota::per_second(rps).allow_burst(burst))))
}

/// Rate limiting middleware; a no-op when limiting is disabled
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(ref limiter) = state.limiter {
        if limiter.check().is_err() {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            return Err(AppError::RateLimited {
                limit: state.config.rate_limit.requests_per_second,
            });
        }
    }

    Ok(next.run(request).await)
}

//! Shared-secret check for key-protected routes.
//!
//! Applied with `route_layer`, so it runs before any extractor touches the
//! body and before any model or storage work.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{error::ApiError, AppState};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` does not match the configured secret.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // ---
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .is_some_and(|key| keys_match(key.as_bytes(), state.api_secret.as_bytes()));

    if !authorized {
        warn!(
            "Rejected {} {}: invalid or missing API key",
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    // ---
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

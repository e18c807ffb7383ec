//! Authentication middleware layer for protecting routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::AppState;

/// Middleware function that requires a valid bearer token.
///
/// Use with `axum::middleware::from_fn_with_state`; on success the caller's
/// [`super::AuthUser`] is available to handlers as an `Extension`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())?;

    let user = state
        .verifier
        .verify(&token)
        .await
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    tracing::debug!(user_id = %user.id, "Authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization header is required"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("Bearer token is required"));
    }

    Ok(token.to_string())
}

//! Admin authentication.
//!
//! Guest identity lives in the external auth system; the only credential
//! this service checks itself is the back-office admin token from the
//! config file.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::AppState;

/// Middleware guarding the /api/admin routes with the configured token.
/// Accepts `Authorization: Bearer <token>` or `X-API-Key: <token>`.
pub async fn admin_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header_token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|header| header.strip_prefix("Bearer ").unwrap_or(header).to_string())
        .or_else(|| {
            request
                .headers()
                .get("X-API-Key")
                .and_then(|h| h.to_str().ok())
                .map(|v| v.to_string())
        });

    let token = header_token.ok_or(StatusCode::UNAUTHORIZED)?;

    // Constant-time comparison to prevent timing attacks
    let admin_token = state.config.auth.admin_token.as_bytes();
    let provided = token.as_bytes();

    if admin_token.len() == provided.len() && bool::from(admin_token.ct_eq(provided)) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rejected admin request with invalid token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

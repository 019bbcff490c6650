//! Authentication Middleware
//!
//! Authenticated routes require the bearer access token plus the refresh
//! token in its dedicated header. Both are checked together: the refresh
//! token must still map to a live session, so revoking it invalidates
//! the access token before its natural expiry.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::AppState;
use crate::models::Account;
use crate::utils::error::AppError;

/// Header carrying the refresh token on authenticated requests
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Extension type storing the authenticated account on the request
#[derive(Debug, Clone)]
pub struct AuthAccount(pub Account);

/// Middleware validating the access + refresh token pair
///
/// On success the resolved [`Account`] is attached to request extensions
/// for handlers to consume.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let access_token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

    let refresh_token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token header".to_string()))?;

    let account = state
        .auth_service
        .authenticate(access_token, refresh_token)
        .await?;

    request.extensions_mut().insert(AuthAccount(account));
    Ok(next.run(request).await)
}

//! API Handlers
//!
//! Thin 1:1 wrappers over the orchestrator operations: parse and
//! validate the payload, call the service, wrap the result in the
//! standard envelope.

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::api::middleware::{AuthAccount, REFRESH_TOKEN_HEADER};
use crate::api::{ApiResponse, AppState};
use crate::models::account::AccountProfile;
use crate::models::oauth::OAuthCallbackQuery;
use crate::models::requests::*;
use crate::models::OAuthProvider;
use crate::utils::error::{AppError, AppResult};

/// Client metadata recorded on new sessions
fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string());
    (user_agent, ip_address)
}

fn parse_provider(provider: &str) -> AppResult<OAuthProvider> {
    match provider {
        "google" => Ok(OAuthProvider::Google),
        "github" => Ok(OAuthProvider::Github),
        other => Err(AppError::BadRequest(format!(
            "Unknown OAuth provider: {}",
            other
        ))),
    }
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    ApiResponse::success(
        StatusCode::OK,
        "OK",
        serde_json::json!({
            "version": crate::VERSION,
            "timestamp": Utc::now(),
        }),
    )
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid registration data: {}", e)))?;

    let account = state
        .auth_service
        .register(
            request.full_name,
            &request.email,
            request.phone,
            &request.password,
            request.redirect_url.as_deref(),
        )
        .await?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Registration successful. Please check your email to verify your account",
        AccountProfile::from(&account),
    ))
}

/// POST /auth/verify-email
///
/// A newly verified account also receives a token pair so the frontend
/// can log the user straight in.
pub async fn verify_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyEmailRequest>,
) -> AppResult<Response> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    let (account, newly_verified) = state.auth_service.verify_email(&request.token).await?;

    if newly_verified {
        let (user_agent, ip_address) = client_meta(&headers);
        let tokens = state
            .auth_service
            .sessions()
            .issue_token_pair(&account, user_agent, ip_address)
            .await?;

        Ok(ApiResponse::success(
            StatusCode::OK,
            "Email verified successfully",
            AuthResponse {
                user: AccountProfile::from(&account),
                tokens,
            },
        )
        .into_response())
    } else {
        Ok(ApiResponse::message(StatusCode::OK, "Email verified successfully").into_response())
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    let outcome = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    let account = match (outcome.valid, outcome.account) {
        (true, Some(account)) => account,
        _ => {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ))
        }
    };

    let (user_agent, ip_address) = client_meta(&headers);
    let tokens = state
        .auth_service
        .sessions()
        .issue_token_pair(&account, user_agent, ip_address)
        .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        AuthResponse {
            user: AccountProfile::from(&account),
            tokens,
        },
    ))
}

/// POST /auth/refresh
///
/// Rotates the refresh token presented in the dedicated header and
/// returns a fresh pair; the old token is invalid afterwards.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let refresh_token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token header".to_string()))?;

    let (user_agent, ip_address) = client_meta(&headers);
    let (account, tokens) = state
        .auth_service
        .sessions()
        .rotate(refresh_token, user_agent, ip_address)
        .await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Token refreshed",
        AuthResponse {
            user: AccountProfile::from(&account),
            tokens,
        },
    ))
}

/// POST /auth/forgot-password
///
/// Responds identically whether or not the address is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    state
        .auth_service
        .forgot_password(&request.email, request.redirect_url.as_deref())
        .await?;

    Ok(ApiResponse::message(
        StatusCode::OK,
        "If that email is registered, a password reset link has been sent",
    ))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    state
        .auth_service
        .reset_password(&request.token, &request.new_password)
        .await?;

    Ok(ApiResponse::message(
        StatusCode::OK,
        "Password reset successfully. Please log in again",
    ))
}

/// GET /auth/me
pub async fn get_profile(
    Extension(AuthAccount(account)): Extension<AuthAccount>,
) -> impl IntoResponse {
    ApiResponse::success(StatusCode::OK, "OK", AccountProfile::from(&account))
}

/// PATCH /auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthAccount(account)): Extension<AuthAccount>,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid update data: {}", e)))?;

    let (updated, msg) = state.auth_service.update_profile(&account, request).await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        msg,
        AccountProfile::from(&updated),
    ))
}

/// POST /auth/logout
///
/// Revokes the session belonging to the presented refresh token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthAccount(account)): Extension<AuthAccount>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let refresh_token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    state.auth_service.logout(account.id, refresh_token).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Logged out"))
}

/// POST /auth/logout-all
///
/// Revokes every session owned by the account.
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(AuthAccount(account)): Extension<AuthAccount>,
) -> AppResult<impl IntoResponse> {
    state.auth_service.logout(account.id, None).await?;
    Ok(ApiResponse::message(
        StatusCode::OK,
        "Logged out of all sessions",
    ))
}

fn oauth_service(state: &AppState) -> AppResult<&crate::service::OAuthService> {
    state
        .oauth_service
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("OAuth is not configured".to_string()))
}

/// GET /auth/oauth/:provider
pub async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Redirect> {
    let provider = parse_provider(&provider)?;
    let url = oauth_service(&state)?.authorize_url(provider)?;
    Ok(Redirect::temporary(&url))
}

/// GET /auth/oauth/:provider/callback
///
/// Finishes the provider flow and redirects to the frontend with a
/// one-time login code.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<Redirect> {
    let provider = parse_provider(&provider)?;
    let (user_agent, ip_address) = client_meta(&headers);

    let redirect = oauth_service(&state)?
        .handle_callback(provider, query.code, user_agent, ip_address)
        .await?;

    Ok(Redirect::temporary(&redirect))
}

/// POST /auth/oauth/exchange
///
/// Trades the one-time login code for the parked account and tokens.
pub async fn exchange_login_code(
    State(state): State<AppState>,
    Json(request): Json<ExchangeCodeRequest>,
) -> AppResult<impl IntoResponse> {
    let grant = oauth_service(&state)?.exchange_code(&request.code)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        AuthResponse {
            user: AccountProfile::from(&grant.account),
            tokens: grant.tokens,
        },
    ))
}

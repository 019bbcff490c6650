//! Route Definitions
//!
//! Maps the orchestrator operations onto their endpoints. Authenticated
//! routes sit behind the access + refresh pairing middleware.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::api::middleware::auth_middleware;
use crate::api::{handlers, AppState};

/// Build the application router
pub fn create_routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/verify-email", post(handlers::verify_email))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/oauth/exchange", post(handlers::exchange_login_code))
        .route("/auth/oauth/:provider", get(handlers::oauth_authorize))
        .route(
            "/auth/oauth/:provider/callback",
            get(handlers::oauth_callback),
        );

    let protected = Router::new()
        .route("/auth/me", get(handlers::get_profile))
        .route("/auth/profile", patch(handlers::update_profile))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    public.merge(protected).with_state(state)
}

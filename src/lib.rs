//! Auth Service Library
//!
//! A credential and identity backend: email + password registration with
//! verification, login with lockout protection, password reset, profile
//! updates, Google/GitHub federated login, and JWT session issuance with
//! rotating refresh tokens.
//!
//! # Features
//!
//! - **Account lifecycle**: register, verify email, update profile with
//!   staged email changes
//! - **Credential security**: bcrypt password hashing, hashed-at-rest
//!   verification and refresh tokens, failed-login lockout
//! - **Sessions**: short-lived JWT access tokens paired with rotating
//!   opaque refresh tokens; revoking a refresh token invalidates its
//!   access token immediately
//! - **Federated login**: Google and GitHub OAuth with a one-time-code
//!   bridge to the frontend
//! - **Pluggable storage**: PostgreSQL and in-memory backends behind
//!   small async ports
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use auth_service::{
//!     config::AppConfig,
//!     service::{AuthService, Mailer, SessionService, TokenCodec},
//!     service::email::LogSender,
//!     storage::{MemoryAccountStore, MemorySessionStore},
//! };
//!
//! # async fn demo() -> Result<(), auth_service::utils::error::AppError> {
//! let config = AppConfig::from_env()?;
//! let accounts = Arc::new(MemoryAccountStore::new());
//! let sessions = Arc::new(MemorySessionStore::new());
//!
//! let codec = TokenCodec::new(&config.jwt);
//! let session_service = SessionService::new(
//!     sessions,
//!     accounts.clone(),
//!     codec,
//!     config.jwt.refresh_token_days,
//! );
//! let mailer = Arc::new(Mailer::new(Arc::new(LogSender), config.jwt.app_name.clone())?);
//! let auth = AuthService::new(accounts, session_service, mailer, config.security.clone());
//!
//! let account = auth
//!     .register("Jane Doe".into(), "jane@example.com", None, "Str0ng!Pass", None)
//!     .await?;
//! println!("registered {}", account.email);
//! # Ok(())
//! # }
//! ```

/// HTTP API layer with handlers, middleware, and routes
pub mod api;

/// Configuration management for all service settings
pub mod config;

/// Database connection management
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Business logic: authentication flows, sessions, tokens, OAuth, email
pub mod service;

/// Storage ports and backends
pub mod storage;

/// Shared utilities for crypto, validation, and error handling
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_routes, ApiResponse, AppState};
pub use config::AppConfig;
pub use models::{Account, AccountProfile, CurrentUser, Session, TokenPair};
pub use service::{
    AuthService, LoginExchangeCache, Mailer, OAuthService, SessionService, TokenCodec,
};
pub use storage::{AccountStore, SessionStore};
pub use utils::error::{AppError, AppResult};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

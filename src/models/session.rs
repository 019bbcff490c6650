//! Session Model
//!
//! A session represents a single refresh-token grant. Only the SHA-256
//! hash of the refresh token is ever stored.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A refresh-token session owned by one account
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,

    /// Owning account
    pub user_id: Uuid,

    /// SHA-256 hash of the refresh token
    pub hashed_refresh_token: String,

    /// Optional client user agent string
    pub user_agent: Option<String>,

    /// Optional client IP address
    pub ip_address: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a new session record
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub hashed_refresh_token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}

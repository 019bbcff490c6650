//! Storage Ports
//!
//! The account and session persistence interfaces the core depends on.
//! Backends implement these traits; the core never sees query language.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Account, AccountPatch, NewAccount, NewSession, Session};
use crate::utils::error::AppResult;

pub use memory::{MemoryAccountStore, MemorySessionStore};
pub use postgres::{PgAccountStore, PgSessionStore};

/// Which of the two independent token slots to match against
///
/// Verification and reset tokens live in separate fields and must never
/// be interchangeable; the kind selects the field pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

/// Account persistence port
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;

    /// Find an account by canonical email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    /// Find any account matching the email or the phone, optionally
    /// excluding one account ID (used for update-conflict checks)
    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        exclude_id: Option<Uuid>,
    ) -> AppResult<Option<Account>>;

    /// Create a new account record
    async fn create(&self, fields: NewAccount) -> AppResult<Account>;

    /// Apply a partial update, returning the updated account
    async fn update(&self, id: Uuid, patch: AccountPatch) -> AppResult<Account>;

    /// Delete the account only if it is still unverified
    ///
    /// The condition is evaluated by the backend in the same statement as
    /// the delete, so a concurrent verification cannot be lost. Returns
    /// the number of rows deleted (0 or 1).
    async fn delete_unverified(&self, id: Uuid) -> AppResult<u64>;

    /// Find an account holding an unexpired token with the given digest
    ///
    /// Abstracts nested-field token matching so each backend can express
    /// the lookup natively (columns, document paths, secondary indexes).
    async fn find_by_hashed_token(
        &self,
        kind: TokenKind,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Account>>;
}

/// Session persistence port
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session record
    async fn create(&self, fields: NewSession) -> AppResult<Session>;

    /// Find a session by refresh-token digest with `expires_at > now`
    async fn find_active_by_hashed_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>>;

    /// Delete the session matching the digest, returning the number of
    /// rows deleted
    ///
    /// The returned count is the rotation serialization point: of two
    /// concurrent rotations of one token, exactly one observes 1 here.
    async fn delete_by_hashed_token(&self, hash: &str) -> AppResult<u64>;

    /// Delete every session owned by the account
    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64>;
}

//! Session Service
//!
//! Issues, rotates, and revokes refresh-token sessions. Refresh tokens
//! are 40 bytes of CSPRNG material handed out in plaintext exactly once;
//! only the SHA-256 digest is persisted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{Account, NewSession, Session, TokenPair};
use crate::service::token::TokenCodec;
use crate::storage::{AccountStore, SessionStore};
use crate::utils::crypto::{generate_token, hash_token};
use crate::utils::error::{AppError, AppResult};

const REFRESH_TOKEN_BYTES: usize = 40;
const GENERIC_TOKEN_ERROR: &str = "Invalid or expired token";

/// Refresh-token session manager
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
    codec: TokenCodec,
    refresh_token_days: i64,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        codec: TokenCodec,
        refresh_token_days: i64,
    ) -> Self {
        Self {
            sessions,
            accounts,
            codec,
            refresh_token_days,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create a session for the account, returning the record and the
    /// plaintext refresh token (the only time it exists outside the
    /// client)
    pub async fn create_session(
        &self,
        account: &Account,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<(Session, String)> {
        let plaintext = generate_token(REFRESH_TOKEN_BYTES);
        let session = self
            .sessions
            .create(NewSession {
                user_id: account.id,
                hashed_refresh_token: hash_token(&plaintext),
                user_agent,
                ip_address,
                expires_at: Utc::now() + Duration::days(self.refresh_token_days),
            })
            .await?;

        Ok((session, plaintext))
    }

    /// Issue an access + refresh token pair for the account
    pub async fn issue_token_pair(
        &self,
        account: &Account,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<TokenPair> {
        let access_token = self.codec.issue(account)?;
        let (_, refresh_token) = self.create_session(account, user_agent, ip_address).await?;

        Ok(TokenPair::new(
            access_token,
            refresh_token,
            self.codec.expires_in_seconds(),
        ))
    }

    /// Rotate a refresh token: invalidate the presented one and issue a
    /// fresh pair
    ///
    /// The counting delete decides races: of two concurrent rotations of
    /// the same token, exactly one deletes the row and proceeds; the
    /// other fails with the generic token error.
    pub async fn rotate(
        &self,
        refresh_token: &str,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<(Account, TokenPair)> {
        let hash = hash_token(refresh_token);
        let now = Utc::now();

        let session = self
            .sessions
            .find_active_by_hashed_token(&hash, now)
            .await?
            .ok_or_else(|| AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()))?;

        let account = self
            .accounts
            .find_by_id(session.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()))?;

        let deleted = self.sessions.delete_by_hashed_token(&hash).await?;
        if deleted == 0 {
            // A concurrent rotation already consumed this token
            return Err(AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()));
        }

        let pair = self
            .issue_token_pair(&account, user_agent, ip_address)
            .await?;
        Ok((account, pair))
    }

    /// Revoke the session matching the refresh token
    ///
    /// Returns whether a session was actually deleted so callers and
    /// tests can tell a real revocation from a no-op.
    pub async fn revoke(&self, refresh_token: &str) -> AppResult<bool> {
        let deleted = self
            .sessions
            .delete_by_hashed_token(&hash_token(refresh_token))
            .await?;
        Ok(deleted > 0)
    }

    /// Revoke every session owned by the account
    pub async fn revoke_all(&self, user_id: Uuid) -> AppResult<u64> {
        self.sessions.delete_all_for_user(user_id).await
    }

    /// Find the live session matching a refresh token, if any
    pub async fn find_active(&self, refresh_token: &str) -> AppResult<Option<Session>> {
        self.sessions
            .find_active_by_hashed_token(&hash_token(refresh_token), Utc::now())
            .await
    }
}

//! In-Memory Storage Backend
//!
//! Mutex-guarded hash maps implementing the storage ports. Used by the
//! service-level test suites and handy for local experimentation; each
//! port method is a single critical section, so the atomicity guarantees
//! match the database backend's single-statement semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::account::{EmailVerification, Lockout, PasswordCredential};
use crate::models::{Account, AccountPatch, NewAccount, NewSession, Session};
use crate::utils::error::{AppError, AppResult};

use super::{AccountStore, SessionStore, TokenKind};

/// In-memory account store
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        exclude_id: Option<Uuid>,
    ) -> AppResult<Option<Account>> {
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }

        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .values()
            .find(|a| {
                if exclude_id == Some(a.id) {
                    return false;
                }
                let email_hit = email.map_or(false, |e| a.email == e);
                let phone_hit =
                    phone.map_or(false, |p| a.phone.as_deref() == Some(p));
                email_hit || phone_hit
            })
            .cloned())
    }

    async fn create(&self, fields: NewAccount) -> AppResult<Account> {
        let now = Utc::now();
        let (hashed_token, token_expires_at) = match fields.verification_token {
            Some((hash, expires_at)) => (Some(hash), Some(expires_at)),
            None => (None, None),
        };

        let account = Account {
            id: Uuid::new_v4(),
            full_name: fields.full_name,
            email: fields.email,
            phone: fields.phone,
            email_verification: EmailVerification {
                is_verified: fields.is_verified,
                hashed_token,
                token_expires_at,
                pending_email: None,
                provider: fields.provider,
            },
            password_credential: PasswordCredential {
                hash: fields.password_hash,
                hashed_reset_token: None,
                reset_token_expires_at: None,
            },
            lockout: Lockout::default(),
            is_active: true,
            last_login_at: fields.last_login_at,
            created_at: now,
            updated_at: now,
        };

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|a| a.email == account.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> AppResult<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        patch.apply_to(account, Utc::now());
        Ok(account.clone())
    }

    async fn delete_unverified(&self, id: Uuid) -> AppResult<u64> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get(&id) {
            Some(account) if !account.email_verification.is_verified => {
                accounts.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_by_hashed_token(
        &self,
        kind: TokenKind,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Account>> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts
            .values()
            .find(|a| {
                let (stored, expires_at) = match kind {
                    TokenKind::EmailVerification => (
                        a.email_verification.hashed_token.as_deref(),
                        a.email_verification.token_expires_at,
                    ),
                    TokenKind::PasswordReset => (
                        a.password_credential.hashed_reset_token.as_deref(),
                        a.password_credential.reset_token_expires_at,
                    ),
                };
                stored == Some(hash) && expires_at.map_or(false, |e| e > now)
            })
            .cloned())
    }
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired or not
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, fields: NewSession) -> AppResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: fields.user_id,
            hashed_refresh_token: fields.hashed_refresh_token,
            user_agent: fields.user_agent,
            ip_address: fields.ip_address,
            expires_at: fields.expires_at,
            created_at: now,
            updated_at: now,
        };

        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_active_by_hashed_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .values()
            .find(|s| s.hashed_refresh_token == hash && s.expires_at > now)
            .cloned())
    }

    async fn delete_by_hashed_token(&self, hash: &str) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = sessions
            .values()
            .find(|s| s.hashed_refresh_token == hash)
            .map(|s| s.id);

        match id {
            Some(id) => {
                sessions.remove(&id);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

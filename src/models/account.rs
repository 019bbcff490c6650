//! Account Model
//!
//! The single closed account schema plus the lockout policy. All
//! datetime fields use UTC.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Email verification state embedded in an account
///
/// `hashed_token`/`token_expires_at` hold the outstanding verification
/// token (initial signup or email change); `pending_email` holds an
/// unconfirmed address change. Only the token hash is ever persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailVerification {
    pub is_verified: bool,
    pub hashed_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub pending_email: Option<String>,
    pub provider: Option<String>,
}

/// Password credential state embedded in an account
///
/// `hash` is None for pure OAuth accounts. The reset token fields hold
/// the outstanding password-reset token, hashed at rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordCredential {
    pub hash: Option<String>,
    pub hashed_reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
}

/// Failed-login lockout state embedded in an account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lockout {
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub failed_attempt_count: u32,
}

impl Lockout {
    /// Whether the account is currently locked
    ///
    /// Locked state is re-derived from `locked_until` against `now`; the
    /// stored flag alone is never trusted, so a lock expires on its own
    /// even if no write ever clears the flag.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.locked_until.map_or(false, |until| until > now)
    }

    /// Record one failed login attempt
    ///
    /// Locks the account for `lock_duration` once the new count reaches
    /// `max_attempts`.
    pub fn record_failure(
        &self,
        max_attempts: u32,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> Lockout {
        let failed_attempt_count = self.failed_attempt_count + 1;
        if failed_attempt_count >= max_attempts {
            Lockout {
                is_locked: true,
                locked_until: Some(now + lock_duration),
                failed_attempt_count,
            }
        } else {
            Lockout {
                is_locked: false,
                locked_until: None,
                failed_attempt_count,
            }
        }
    }

    /// All-clear lockout state
    pub fn reset() -> Lockout {
        Lockout::default()
    }
}

/// Identity record
///
/// Internal representation; never serialized directly. API responses use
/// [`AccountProfile`], which strips credential and token material.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub full_name: String,
    /// Canonical email, lowercase, unique
    pub email: String,
    /// Optional phone number, unique when present
    pub phone: Option<String>,
    pub email_verification: EmailVerification,
    pub password_credential: PasswordCredential,
    pub lockout: Lockout,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// An account created through a federated provider with no password
    /// set cannot authenticate via password.
    pub fn is_oauth_only(&self) -> bool {
        self.password_credential.hash.is_none() && self.email_verification.provider.is_some()
    }
}

/// Account representation for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        AccountProfile {
            id: account.id,
            full_name: account.full_name.clone(),
            email: account.email.clone(),
            phone: account.phone.clone(),
            is_verified: account.email_verification.is_verified,
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Fields for creating a new account record
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub is_verified: bool,
    /// Hashed verification token and its expiry, when one is issued at
    /// creation time
    pub verification_token: Option<(String, DateTime<Utc>)>,
    pub provider: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Tri-state field update: leave untouched, set a value, or null out
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Apply this patch to an optional slot
    pub fn apply(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value),
            Patch::Clear => *slot = None,
        }
    }
}

/// Partial account update
///
/// The one shape every account mutation goes through; nullable fields use
/// [`Patch`] so "leave alone" and "null out" stay distinct. Token hashes
/// travel with their expiries so the pair can never go out of sync.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Patch<String>,
    pub password_hash: Patch<String>,
    pub is_verified: Option<bool>,
    pub verification_token: Patch<(String, DateTime<Utc>)>,
    pub pending_email: Patch<String>,
    pub provider: Patch<String>,
    pub reset_token: Patch<(String, DateTime<Utc>)>,
    pub lockout: Option<Lockout>,
    pub is_active: Option<bool>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl AccountPatch {
    /// Apply the patch to an account in place, stamping `updated_at`
    ///
    /// Shared by the in-memory store; the Postgres store mirrors the same
    /// semantics column by column.
    pub fn apply_to(self, account: &mut Account, now: DateTime<Utc>) {
        if let Some(full_name) = self.full_name {
            account.full_name = full_name;
        }
        if let Some(email) = self.email {
            account.email = email;
        }
        self.phone.apply(&mut account.phone);

        self.password_hash.apply(&mut account.password_credential.hash);
        match self.reset_token {
            Patch::Keep => {}
            Patch::Set((hash, expires_at)) => {
                account.password_credential.hashed_reset_token = Some(hash);
                account.password_credential.reset_token_expires_at = Some(expires_at);
            }
            Patch::Clear => {
                account.password_credential.hashed_reset_token = None;
                account.password_credential.reset_token_expires_at = None;
            }
        }

        if let Some(is_verified) = self.is_verified {
            account.email_verification.is_verified = is_verified;
        }
        match self.verification_token {
            Patch::Keep => {}
            Patch::Set((hash, expires_at)) => {
                account.email_verification.hashed_token = Some(hash);
                account.email_verification.token_expires_at = Some(expires_at);
            }
            Patch::Clear => {
                account.email_verification.hashed_token = None;
                account.email_verification.token_expires_at = None;
            }
        }
        self.pending_email
            .apply(&mut account.email_verification.pending_email);
        self.provider.apply(&mut account.email_verification.provider);

        if let Some(lockout) = self.lockout {
            account.lockout = lockout;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
        if let Some(last_login_at) = self.last_login_at {
            account.last_login_at = Some(last_login_at);
        }

        account.updated_at = now;
    }
}

//! PostgreSQL Storage Backend
//!
//! sqlx-based implementations of the storage ports. Queries use the
//! runtime API; rows are flat structs converted into the domain types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::account::{EmailVerification, Lockout, Patch, PasswordCredential};
use crate::models::{Account, AccountPatch, NewAccount, NewSession, Session};
use crate::utils::error::{AppError, AppResult};

use super::{AccountStore, SessionStore, TokenKind};

const ACCOUNT_COLUMNS: &str = "id, full_name, email, phone, is_verified, \
     verification_token_hash, verification_token_expires_at, pending_email, provider, \
     password_hash, reset_token_hash, reset_token_expires_at, \
     is_locked, locked_until, failed_attempts, is_active, last_login_at, \
     created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token_hash, user_agent, ip_address, expires_at, created_at, updated_at";

/// Flat account row as stored in the `accounts` table
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: Option<String>,
    is_verified: bool,
    verification_token_hash: Option<String>,
    verification_token_expires_at: Option<DateTime<Utc>>,
    pending_email: Option<String>,
    provider: Option<String>,
    password_hash: Option<String>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    is_locked: bool,
    locked_until: Option<DateTime<Utc>>,
    failed_attempts: i32,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            email_verification: EmailVerification {
                is_verified: row.is_verified,
                hashed_token: row.verification_token_hash,
                token_expires_at: row.verification_token_expires_at,
                pending_email: row.pending_email,
                provider: row.provider,
            },
            password_credential: PasswordCredential {
                hash: row.password_hash,
                hashed_reset_token: row.reset_token_hash,
                reset_token_expires_at: row.reset_token_expires_at,
            },
            lockout: Lockout {
                is_locked: row.is_locked,
                locked_until: row.locked_until,
                failed_attempt_count: row.failed_attempts.max(0) as u32,
            },
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Flat session row as stored in the `sessions` table
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    refresh_token_hash: String,
    user_agent: Option<String>,
    ip_address: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            hashed_refresh_token: row.refresh_token_hash,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_constraint_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("accounts_email_key") => {
                return AppError::Conflict("Email already registered".to_string())
            }
            Some("accounts_phone_key") => {
                return AppError::Conflict("Phone number already registered".to_string())
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

/// Account store backed by PostgreSQL
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Account::from))
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

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE ("));
        let mut separated = false;
        if let Some(email) = email {
            builder.push("email = ").push_bind(email.to_string());
            separated = true;
        }
        if let Some(phone) = phone {
            if separated {
                builder.push(" OR ");
            }
            builder.push("phone = ").push_bind(phone.to_string());
        }
        builder.push(")");
        if let Some(exclude_id) = exclude_id {
            builder.push(" AND id <> ").push_bind(exclude_id);
        }
        builder.push(" LIMIT 1");

        let row = builder
            .build_query_as::<AccountRow>()
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Account::from))
    }

    async fn create(&self, fields: NewAccount) -> AppResult<Account> {
        let now = Utc::now();
        let (token_hash, token_expires_at) = match fields.verification_token {
            Some((hash, expires_at)) => (Some(hash), Some(expires_at)),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts \
             (id, full_name, email, phone, is_verified, \
              verification_token_hash, verification_token_expires_at, pending_email, provider, \
              password_hash, reset_token_hash, reset_token_expires_at, \
              is_locked, locked_until, failed_attempts, is_active, last_login_at, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9, NULL, NULL, \
                     FALSE, NULL, 0, TRUE, $10, $11, $11) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(fields.full_name)
        .bind(fields.email)
        .bind(fields.phone)
        .bind(fields.is_verified)
        .bind(token_hash)
        .bind(token_expires_at)
        .bind(fields.provider)
        .bind(fields.password_hash)
        .bind(fields.last_login_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_constraint_error)?;

        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: AccountPatch) -> AppResult<Account> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE accounts SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(full_name) = patch.full_name {
            builder.push(", full_name = ").push_bind(full_name);
        }
        if let Some(email) = patch.email {
            builder.push(", email = ").push_bind(email);
        }
        match patch.phone {
            Patch::Keep => {}
            Patch::Set(phone) => {
                builder.push(", phone = ").push_bind(phone);
            }
            Patch::Clear => {
                builder.push(", phone = NULL");
            }
        }
        match patch.password_hash {
            Patch::Keep => {}
            Patch::Set(hash) => {
                builder.push(", password_hash = ").push_bind(hash);
            }
            Patch::Clear => {
                builder.push(", password_hash = NULL");
            }
        }
        if let Some(is_verified) = patch.is_verified {
            builder.push(", is_verified = ").push_bind(is_verified);
        }
        match patch.verification_token {
            Patch::Keep => {}
            Patch::Set((hash, expires_at)) => {
                builder
                    .push(", verification_token_hash = ")
                    .push_bind(hash)
                    .push(", verification_token_expires_at = ")
                    .push_bind(expires_at);
            }
            Patch::Clear => {
                builder.push(
                    ", verification_token_hash = NULL, verification_token_expires_at = NULL",
                );
            }
        }
        match patch.pending_email {
            Patch::Keep => {}
            Patch::Set(pending) => {
                builder.push(", pending_email = ").push_bind(pending);
            }
            Patch::Clear => {
                builder.push(", pending_email = NULL");
            }
        }
        match patch.provider {
            Patch::Keep => {}
            Patch::Set(provider) => {
                builder.push(", provider = ").push_bind(provider);
            }
            Patch::Clear => {
                builder.push(", provider = NULL");
            }
        }
        match patch.reset_token {
            Patch::Keep => {}
            Patch::Set((hash, expires_at)) => {
                builder
                    .push(", reset_token_hash = ")
                    .push_bind(hash)
                    .push(", reset_token_expires_at = ")
                    .push_bind(expires_at);
            }
            Patch::Clear => {
                builder.push(", reset_token_hash = NULL, reset_token_expires_at = NULL");
            }
        }
        if let Some(lockout) = patch.lockout {
            builder
                .push(", is_locked = ")
                .push_bind(lockout.is_locked)
                .push(", locked_until = ")
                .push_bind(lockout.locked_until)
                .push(", failed_attempts = ")
                .push_bind(lockout.failed_attempt_count as i32);
        }
        if let Some(is_active) = patch.is_active {
            builder.push(", is_active = ").push_bind(is_active);
        }
        if let Some(last_login_at) = patch.last_login_at {
            builder.push(", last_login_at = ").push_bind(last_login_at);
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(format!(" RETURNING {ACCOUNT_COLUMNS}"));

        let row = builder
            .build_query_as::<AccountRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_constraint_error)?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        Ok(row.into())
    }

    async fn delete_unverified(&self, id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1 AND is_verified = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_hashed_token(
        &self,
        kind: TokenKind,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Account>> {
        let query = match kind {
            TokenKind::EmailVerification => format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts \
                 WHERE verification_token_hash = $1 AND verification_token_expires_at > $2"
            ),
            TokenKind::PasswordReset => format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts \
                 WHERE reset_token_hash = $1 AND reset_token_expires_at > $2"
            ),
        };

        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Account::from))
    }
}

/// Session store backed by PostgreSQL
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, fields: NewSession) -> AppResult<Session> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO sessions \
             (id, user_id, refresh_token_hash, user_agent, ip_address, expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(fields.user_id)
        .bind(fields.hashed_refresh_token)
        .bind(fields.user_agent)
        .bind(fields.ip_address)
        .bind(fields.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_active_by_hashed_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE refresh_token_hash = $1 AND expires_at > $2"
        ))
        .bind(hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    async fn delete_by_hashed_token(&self, hash: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_token_hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

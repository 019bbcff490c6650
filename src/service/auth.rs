//! Authentication Orchestrator
//!
//! Composes the crypto primitives, verification tokens, lockout policy,
//! and session manager into the account flows: register, verify email,
//! login, forgot/reset password, update profile, logout, and the
//! per-request access + refresh pairing check.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::models::account::{Lockout, Patch};
use crate::models::requests::UpdateProfileRequest;
use crate::models::verification::IssuedToken;
use crate::models::{Account, AccountPatch, CurrentUser, NewAccount};
use crate::service::email::Mailer;
use crate::service::session::SessionService;
use crate::storage::{AccountStore, TokenKind};
use crate::utils::crypto::{hash_password, hash_token, verify_password};
use crate::utils::error::{AppError, AppResult};
use crate::utils::validation::normalize_email;

const VERIFICATION_TOKEN_TTL_DAYS: i64 = 1;
const RESET_TOKEN_TTL_MINUTES: i64 = 30;
const GENERIC_TOKEN_ERROR: &str = "Invalid or expired token";

/// Result of a credential check
///
/// Wrong credentials are not an error at this layer: the caller maps
/// `valid == false` to 401 without learning which field was wrong.
#[derive(Debug)]
pub struct LoginOutcome {
    pub account: Option<Account>,
    pub valid: bool,
}

/// Core authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: SessionService,
    mailer: Arc<Mailer>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: SessionService,
        mailer: Arc<Mailer>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            accounts,
            sessions,
            mailer,
            security,
        }
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    /// Register a new account and send its verification email
    ///
    /// An unverified account holding the same email or phone is treated
    /// as an abandoned registration and removed first; a verified one is
    /// a conflict. Failure to send the verification email is logged but
    /// does not fail the registration.
    pub async fn register(
        &self,
        full_name: String,
        email: &str,
        phone: Option<String>,
        password: &str,
        redirect_url: Option<&str>,
    ) -> AppResult<Account> {
        let email = normalize_email(email);

        if let Some(existing) = self
            .accounts
            .find_by_email_or_phone(Some(&email), phone.as_deref(), None)
            .await?
        {
            if existing.email_verification.is_verified {
                return Err(AppError::Conflict(
                    "An account with this email or phone already exists".to_string(),
                ));
            }
            self.accounts.delete_unverified(existing.id).await?;
        }

        let token = IssuedToken::generate(Duration::days(VERIFICATION_TOKEN_TTL_DAYS));
        let password_hash = hash_password(password, self.security.bcrypt_cost)?;

        let account = self
            .accounts
            .create(NewAccount {
                full_name,
                email,
                phone,
                password_hash: Some(password_hash),
                is_verified: false,
                verification_token: Some((token.hashed.clone(), token.expires_at)),
                provider: None,
                last_login_at: None,
            })
            .await?;

        if let Err(e) = self
            .mailer
            .send_verification_email(
                &account.email,
                &account.full_name,
                &token.plaintext,
                redirect_url,
                "24 hours",
            )
            .await
        {
            log::warn!(
                "Verification email to {} failed, account created anyway: {}",
                account.email,
                e
            );
        }

        Ok(account)
    }

    /// Confirm an email address with a verification token
    ///
    /// Returns the account and whether this call performed the
    /// unverified-to-verified transition (false when the account was
    /// already verified, e.g. an email change). A staged pending email is
    /// promoted to canonical here, after a final conflict check.
    pub async fn verify_email(&self, token: &str) -> AppResult<(Account, bool)> {
        let account = self
            .accounts
            .find_by_hashed_token(TokenKind::EmailVerification, &hash_token(token), Utc::now())
            .await?
            .ok_or_else(|| {
                AppError::Forbidden("Invalid or expired verification token".to_string())
            })?;

        let newly_verified = !account.email_verification.is_verified;

        let mut patch = AccountPatch {
            is_verified: Some(true),
            verification_token: Patch::Clear,
            ..Default::default()
        };

        if let Some(pending) = &account.email_verification.pending_email {
            let claimed = self
                .accounts
                .find_by_email_or_phone(Some(pending), None, Some(account.id))
                .await?;
            if claimed.is_some() {
                return Err(AppError::Conflict(
                    "Email already registered to another account".to_string(),
                ));
            }
            patch.email = Some(pending.clone());
            patch.pending_email = Patch::Clear;
        }

        let updated = self.accounts.update(account.id, patch).await?;
        Ok((updated, newly_verified))
    }

    /// Check email + password credentials
    ///
    /// Unknown email yields `{account: None, valid: false}` with no hint
    /// about which field was wrong. Wrong password records a failed
    /// attempt (locking the account at the configured threshold) and
    /// yields `valid: false`. Success clears the counter and stamps
    /// `last_login_at`. OAuth-only, unverified, and locked accounts fail
    /// with their distinct errors before any password comparison.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let now = Utc::now();
        let account = match self.accounts.find_by_email(&normalize_email(email)).await? {
            Some(account) => account,
            None => {
                return Ok(LoginOutcome {
                    account: None,
                    valid: false,
                })
            }
        };

        if account.is_oauth_only() {
            // No password comparison happens here, so the failed-attempt
            // counter stays untouched.
            return Err(AppError::Forbidden(
                "This account uses social login. Use the password reset flow to set a password"
                    .to_string(),
            ));
        }

        if !account.email_verification.is_verified {
            return Err(AppError::Forbidden(
                "Please verify your email address before logging in".to_string(),
            ));
        }

        if account.lockout.is_locked(now) {
            return Err(AppError::Locked(
                "Account temporarily locked due to repeated failed logins. Try again later"
                    .to_string(),
            ));
        }

        if !verify_password(password, account.password_credential.hash.as_deref()) {
            let lockout = account.lockout.record_failure(
                self.security.max_failed_attempts,
                Duration::minutes(self.security.lockout_minutes),
                now,
            );
            let updated = self
                .accounts
                .update(
                    account.id,
                    AccountPatch {
                        lockout: Some(lockout),
                        ..Default::default()
                    },
                )
                .await?;

            return Ok(LoginOutcome {
                account: Some(updated),
                valid: false,
            });
        }

        let mut patch = AccountPatch {
            last_login_at: Some(now),
            ..Default::default()
        };
        if account.lockout.failed_attempt_count > 0 || account.lockout.is_locked {
            patch.lockout = Some(Lockout::reset());
        }
        let updated = self.accounts.update(account.id, patch).await?;

        Ok(LoginOutcome {
            account: Some(updated),
            valid: true,
        })
    }

    /// Start the password-reset flow
    ///
    /// Silently succeeds when no account matches, so the endpoint cannot
    /// be used to enumerate registered addresses.
    pub async fn forgot_password(&self, email: &str, redirect_url: Option<&str>) -> AppResult<()> {
        let email = normalize_email(email);
        let account = match self.accounts.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                log::debug!("Password reset requested for unknown email");
                return Ok(());
            }
        };

        let token = IssuedToken::generate(Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        self.accounts
            .update(
                account.id,
                AccountPatch {
                    reset_token: Patch::Set((token.hashed.clone(), token.expires_at)),
                    ..Default::default()
                },
            )
            .await?;

        self.mailer
            .send_password_reset_email(
                &account.email,
                &account.full_name,
                &token.plaintext,
                redirect_url,
                "30 minutes",
            )
            .await
    }

    /// Complete the password-reset flow with a token
    ///
    /// A successful reset proves mailbox ownership, so it also unlocks a
    /// locked account and verifies an unverified one. Every existing
    /// session is revoked, forcing re-login everywhere.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<Account> {
        let account = self
            .accounts
            .find_by_hashed_token(TokenKind::PasswordReset, &hash_token(token), Utc::now())
            .await?
            .ok_or_else(|| AppError::Forbidden("Invalid or expired reset token".to_string()))?;

        let mut patch = AccountPatch {
            password_hash: Patch::Set(hash_password(new_password, self.security.bcrypt_cost)?),
            reset_token: Patch::Clear,
            ..Default::default()
        };
        if account.lockout.is_locked || account.lockout.failed_attempt_count > 0 {
            patch.lockout = Some(Lockout::reset());
        }
        if !account.email_verification.is_verified {
            patch.is_verified = Some(true);
            patch.verification_token = Patch::Clear;
        }

        let updated = self.accounts.update(account.id, patch).await?;
        self.sessions.revoke_all(updated.id).await?;

        Ok(updated)
    }

    /// Apply a partial profile update
    ///
    /// An email change is staged into `pending_email` with a fresh
    /// verification token and mailed to the new address; if that mail
    /// fails, the staged fields are rolled back before the error is
    /// re-raised so no unconfirmable pending state is left behind. The
    /// returned message reflects a password change in preference to the
    /// generic one. An empty update is a no-op success.
    pub async fn update_profile(
        &self,
        account: &Account,
        request: UpdateProfileRequest,
    ) -> AppResult<(Account, &'static str)> {
        if request.is_empty() {
            return Ok((account.clone(), "Profile updated successfully"));
        }

        let new_email = request
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| *e != account.email);
        let new_phone = request
            .phone
            .clone()
            .filter(|p| account.phone.as_deref() != Some(p.as_str()));

        if new_email.is_some() || new_phone.is_some() {
            if let Some(existing) = self
                .accounts
                .find_by_email_or_phone(new_email.as_deref(), new_phone.as_deref(), Some(account.id))
                .await?
            {
                if existing.email_verification.is_verified {
                    return Err(AppError::Conflict(
                        "An account with this email or phone already exists".to_string(),
                    ));
                }
                self.accounts.delete_unverified(existing.id).await?;
            }
        }

        let mut patch = AccountPatch::default();
        if let Some(full_name) = request.full_name {
            patch.full_name = Some(full_name);
        }
        if let Some(phone) = new_phone {
            patch.phone = Patch::Set(phone);
        }

        let mut email_change: Option<(String, IssuedToken)> = None;
        if let Some(pending) = new_email {
            let token = IssuedToken::generate(Duration::days(VERIFICATION_TOKEN_TTL_DAYS));
            patch.pending_email = Patch::Set(pending.clone());
            patch.verification_token = Patch::Set((token.hashed.clone(), token.expires_at));
            email_change = Some((pending, token));
        }

        let password_changed = request.password.is_some();
        if let Some(password) = request.password {
            patch.password_hash = Patch::Set(hash_password(&password, self.security.bcrypt_cost)?);
        }

        let updated = self.accounts.update(account.id, patch).await?;

        if let Some((pending, token)) = email_change {
            if let Err(e) = self
                .mailer
                .send_verification_email(
                    &pending,
                    &updated.full_name,
                    &token.plaintext,
                    request.redirect_url.as_deref(),
                    "24 hours",
                )
                .await
            {
                // Compensating action: the staged change must not survive
                // if its confirmation email never went out.
                let rollback = AccountPatch {
                    pending_email: Patch::Clear,
                    verification_token: Patch::Clear,
                    ..Default::default()
                };
                if let Err(rollback_err) = self.accounts.update(account.id, rollback).await {
                    log::error!(
                        "Failed to roll back pending email for account {}: {}",
                        account.id,
                        rollback_err
                    );
                }
                return Err(e);
            }
        }

        let msg = if password_changed {
            "Password updated successfully"
        } else {
            "Profile updated successfully"
        };
        Ok((updated, msg))
    }

    /// Revoke one session (when a refresh token is presented) or all of
    /// the account's sessions
    pub async fn logout(&self, account_id: Uuid, refresh_token: Option<&str>) -> AppResult<()> {
        match refresh_token {
            Some(token) => {
                let revoked = self.sessions.revoke(token).await?;
                if !revoked {
                    log::debug!("Logout presented an unknown refresh token");
                }
            }
            None => {
                self.sessions.revoke_all(account_id).await?;
            }
        }
        Ok(())
    }

    /// Authenticate a request from its access + refresh token pair
    ///
    /// The access token must verify and the refresh token must still map
    /// to a live session of the same account, so revoking a refresh token
    /// invalidates its access token before the natural expiry.
    pub async fn authenticate(&self, access_token: &str, refresh_token: &str) -> AppResult<Account> {
        let claims = self.sessions.codec().verify(access_token)?;
        let current = CurrentUser::from_claims(&claims)
            .map_err(|_| AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()))?;

        let session = self
            .sessions
            .find_active(refresh_token)
            .await?
            .ok_or_else(|| AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()))?;
        if session.user_id != current.user_id {
            return Err(AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()));
        }

        let account = self
            .accounts
            .find_by_id(current.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string()))?;
        if !account.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::service::email::RecordingSender;
    use crate::service::token::TokenCodec;
    use crate::storage::{MemoryAccountStore, MemorySessionStore};

    struct Harness {
        auth: AuthService,
        accounts: Arc<MemoryAccountStore>,
        sessions: Arc<MemorySessionStore>,
        sender: Arc<RecordingSender>,
    }

    fn harness() -> Harness {
        let accounts: Arc<MemoryAccountStore> = Arc::new(MemoryAccountStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let sender = Arc::new(RecordingSender::new());

        let codec = TokenCodec::new(&JwtConfig {
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            app_name: "auth-service".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 30,
        });
        let session_service = SessionService::new(
            sessions.clone(),
            accounts.clone(),
            codec,
            30,
        );
        let mailer = Arc::new(
            Mailer::new(sender.clone(), "auth-service".to_string()).unwrap(),
        );
        let auth = AuthService::new(
            accounts.clone(),
            session_service,
            mailer,
            SecurityConfig {
                bcrypt_cost: 4, // keep the test suite fast
                max_failed_attempts: 5,
                lockout_minutes: 30,
                login_code_ttl_seconds: 60,
            },
        );

        Harness {
            auth,
            accounts,
            sessions,
            sender,
        }
    }

    async fn register_jane(h: &Harness) -> Account {
        h.auth
            .register(
                "Jane Doe".to_string(),
                "jane@x.com",
                None,
                "Str0ng!Pass",
                Some("https://x"),
            )
            .await
            .unwrap()
    }

    async fn register_verified_jane(h: &Harness) -> Account {
        register_jane(h).await;
        let token = h.sender.last_token().unwrap();
        let (account, _) = h.auth.verify_email(&token).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let h = harness();

        let account = register_jane(&h).await;
        assert!(!account.email_verification.is_verified);
        assert!(account.email_verification.hashed_token.is_some());
        assert_eq!(h.sender.sent_count(), 1);
        assert_eq!(h.sender.last_recipient().unwrap(), "jane@x.com");

        let token = h.sender.last_token().unwrap();
        let (verified, newly_verified) = h.auth.verify_email(&token).await.unwrap();
        assert!(newly_verified);
        assert!(verified.email_verification.is_verified);
        assert!(verified.email_verification.hashed_token.is_none());
        assert!(verified.email_verification.token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let h = harness();
        let account = h
            .auth
            .register(
                "Jane Doe".to_string(),
                "  JANE@X.COM ",
                None,
                "Str0ng!Pass",
                None,
            )
            .await
            .unwrap();
        assert_eq!(account.email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_register_email_failure_is_not_fatal() {
        let h = harness();
        h.sender.set_fail(true);

        let account = register_jane(&h).await;
        assert_eq!(h.sender.sent_count(), 0);
        assert!(h
            .accounts
            .find_by_id(account.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_register_conflicts_with_verified_account() {
        let h = harness();
        register_verified_jane(&h).await;

        let result = h
            .auth
            .register(
                "Other Jane".to_string(),
                "jane@x.com",
                None,
                "Other!Pass1",
                None,
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_replaces_abandoned_registration() {
        let h = harness();
        let first = register_jane(&h).await;

        let second = h
            .auth
            .register(
                "Jane Again".to_string(),
                "jane@x.com",
                None,
                "Other!Pass1",
                None,
            )
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert!(h.accounts.find_by_id(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let h = harness();
        register_jane(&h).await;
        let token = h.sender.last_token().unwrap();

        assert!(h.auth.verify_email(&token).await.is_ok());
        let replay = h.auth.verify_email(&token).await;
        assert!(matches!(replay, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_verify_with_garbage_token_fails() {
        let h = harness();
        register_jane(&h).await;

        let result = h.auth.verify_email("deadbeef").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_login_success_stamps_last_login() {
        let h = harness();
        let account = register_verified_jane(&h).await;
        assert!(account.last_login_at.is_none());

        let outcome = h.auth.login("jane@x.com", "Str0ng!Pass").await.unwrap();
        assert!(outcome.valid);
        let account = outcome.account.unwrap();
        assert!(account.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_login_unknown_email_leaks_nothing() {
        let h = harness();

        let outcome = h.auth.login("nobody@x.com", "whatever").await.unwrap();
        assert!(!outcome.valid);
        assert!(outcome.account.is_none());
    }

    #[tokio::test]
    async fn test_login_unverified_account_forbidden() {
        let h = harness();
        register_jane(&h).await;

        let result = h.auth.login("jane@x.com", "Str0ng!Pass").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_login_wrong_password_counts_failures() {
        let h = harness();
        register_verified_jane(&h).await;

        for expected in 1..=4u32 {
            let outcome = h.auth.login("jane@x.com", "wrong-pass").await.unwrap();
            assert!(!outcome.valid);
            let account = outcome.account.unwrap();
            assert!(!account.lockout.is_locked);
            assert_eq!(account.lockout.failed_attempt_count, expected);
        }

        // Fifth failure locks the account
        let outcome = h.auth.login("jane@x.com", "wrong-pass").await.unwrap();
        let account = outcome.account.unwrap();
        assert!(account.lockout.is_locked);
        assert_eq!(account.lockout.failed_attempt_count, 5);
        assert!(account.lockout.locked_until.unwrap() > Utc::now());

        // Even the correct password is rejected while locked
        let locked = h.auth.login("jane@x.com", "Str0ng!Pass").await;
        assert!(matches!(locked, Err(AppError::Locked(_))));
    }

    #[tokio::test]
    async fn test_login_success_resets_counter() {
        let h = harness();
        register_verified_jane(&h).await;

        for _ in 0..3 {
            h.auth.login("jane@x.com", "wrong-pass").await.unwrap();
        }
        let outcome = h.auth.login("jane@x.com", "Str0ng!Pass").await.unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.account.unwrap().lockout.failed_attempt_count, 0);
    }

    #[tokio::test]
    async fn test_login_oauth_only_account_forbidden_without_counting() {
        let h = harness();
        let account = h
            .accounts
            .create(NewAccount {
                full_name: "Octo Cat".to_string(),
                email: "octo@x.com".to_string(),
                phone: None,
                password_hash: None,
                is_verified: true,
                verification_token: None,
                provider: Some("github".to_string()),
                last_login_at: None,
            })
            .await
            .unwrap();

        let result = h.auth.login("octo@x.com", "whatever").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        // No password comparison happened, so nothing was counted
        let account = h.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.lockout.failed_attempt_count, 0);
    }

    #[tokio::test]
    async fn test_forgot_password_is_enumeration_safe() {
        let h = harness();
        register_verified_jane(&h).await;
        let sent_before = h.sender.sent_count();

        // Unknown address: silent success, no email
        h.auth
            .forgot_password("nobody@x.com", None)
            .await
            .unwrap();
        assert_eq!(h.sender.sent_count(), sent_before);

        // Known address: reset email goes out
        h.auth
            .forgot_password("jane@x.com", Some("https://x/reset"))
            .await
            .unwrap();
        assert_eq!(h.sender.sent_count(), sent_before + 1);
    }

    #[tokio::test]
    async fn test_reset_password_full_side_effects() {
        let h = harness();
        let account = register_verified_jane(&h).await;

        // Give the account sessions, a lock, and strip verification to
        // exercise every side effect at once
        h.auth
            .sessions()
            .issue_token_pair(&account, None, None)
            .await
            .unwrap();
        h.auth
            .sessions()
            .issue_token_pair(&account, None, None)
            .await
            .unwrap();
        h.accounts
            .update(
                account.id,
                AccountPatch {
                    is_verified: Some(false),
                    lockout: Some(Lockout {
                        is_locked: true,
                        locked_until: Some(Utc::now() + Duration::minutes(30)),
                        failed_attempt_count: 5,
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        h.auth
            .forgot_password("jane@x.com", Some("https://x/reset"))
            .await
            .unwrap();
        let token = h.sender.last_token().unwrap();

        let updated = h.auth.reset_password(&token, "NewP@ss1word").await.unwrap();

        assert!(!updated.lockout.is_locked);
        assert_eq!(updated.lockout.failed_attempt_count, 0);
        assert!(updated.email_verification.is_verified);
        assert!(updated.password_credential.hashed_reset_token.is_none());
        assert!(h.sessions.is_empty());

        // The new password works
        let outcome = h.auth.login("jane@x.com", "NewP@ss1word").await.unwrap();
        assert!(outcome.valid);
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let h = harness();
        register_verified_jane(&h).await;
        h.auth
            .forgot_password("jane@x.com", Some("https://x/reset"))
            .await
            .unwrap();
        let token = h.sender.last_token().unwrap();

        assert!(h.auth.reset_password(&token, "NewP@ss1word").await.is_ok());
        let replay = h.auth.reset_password(&token, "Again!Pass1").await;
        assert!(matches!(replay, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_reset_token_does_not_verify_email_flow() {
        let h = harness();
        register_verified_jane(&h).await;
        h.auth
            .forgot_password("jane@x.com", Some("https://x/reset"))
            .await
            .unwrap();
        let reset_token = h.sender.last_token().unwrap();

        // A reset token must not pass as a verification token
        let result = h.auth.verify_email(&reset_token).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_profile_empty_is_noop() {
        let h = harness();
        let account = register_verified_jane(&h).await;

        let (unchanged, msg) = h
            .auth
            .update_profile(&account, UpdateProfileRequest::default())
            .await
            .unwrap();

        assert_eq!(unchanged.updated_at, account.updated_at);
        assert_eq!(msg, "Profile updated successfully");
    }

    #[tokio::test]
    async fn test_update_profile_stages_email_change() {
        let h = harness();
        let account = register_verified_jane(&h).await;

        let (updated, _) = h
            .auth
            .update_profile(
                &account,
                UpdateProfileRequest {
                    email: Some("new@x.com".to_string()),
                    redirect_url: Some("https://x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Canonical email untouched until the new address is confirmed
        assert_eq!(updated.email, "jane@x.com");
        assert_eq!(
            updated.email_verification.pending_email.as_deref(),
            Some("new@x.com")
        );
        assert!(updated.email_verification.is_verified);
        assert_eq!(h.sender.last_recipient().unwrap(), "new@x.com");

        // Confirming the token promotes the pending address
        let token = h.sender.last_token().unwrap();
        let (confirmed, newly_verified) = h.auth.verify_email(&token).await.unwrap();
        assert!(!newly_verified); // was already verified
        assert_eq!(confirmed.email, "new@x.com");
        assert!(confirmed.email_verification.pending_email.is_none());
    }

    #[tokio::test]
    async fn test_update_profile_rolls_back_pending_email_on_mail_failure() {
        let h = harness();
        let account = register_verified_jane(&h).await;
        h.sender.set_fail(true);

        let result = h
            .auth
            .update_profile(
                &account,
                UpdateProfileRequest {
                    email: Some("new@x.com".to_string()),
                    redirect_url: Some("https://x".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::EmailDelivery(_))));

        let stored = h.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.email_verification.pending_email.is_none());
        assert!(stored.email_verification.hashed_token.is_none());
        assert!(stored.email_verification.token_expires_at.is_none());
        assert_eq!(stored.email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_update_profile_password_message_wins() {
        let h = harness();
        let account = register_verified_jane(&h).await;

        let (_, msg) = h
            .auth
            .update_profile(
                &account,
                UpdateProfileRequest {
                    email: Some("new@x.com".to_string()),
                    password: Some("Fresh!Pass1".to_string()),
                    redirect_url: Some("https://x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(msg, "Password updated successfully");
    }

    #[tokio::test]
    async fn test_update_profile_conflicting_verified_email() {
        let h = harness();
        let account = register_verified_jane(&h).await;

        h.auth
            .register(
                "Someone Else".to_string(),
                "taken@x.com",
                None,
                "Their!Pass1",
                Some("https://x"),
            )
            .await
            .unwrap();
        let token = h.sender.last_token().unwrap();
        h.auth.verify_email(&token).await.unwrap();

        let result = h
            .auth
            .update_profile(
                &account,
                UpdateProfileRequest {
                    email: Some("taken@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_logout_single_session() {
        let h = harness();
        let account = register_verified_jane(&h).await;
        let first = h
            .auth
            .sessions()
            .issue_token_pair(&account, None, None)
            .await
            .unwrap();
        let second = h
            .auth
            .sessions()
            .issue_token_pair(&account, None, None)
            .await
            .unwrap();

        h.auth
            .logout(account.id, Some(&first.refresh_token))
            .await
            .unwrap();

        assert_eq!(h.sessions.len(), 1);
        assert!(h
            .auth
            .sessions()
            .find_active(&second.refresh_token)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_logout_all_sessions() {
        let h = harness();
        let account = register_verified_jane(&h).await;
        for _ in 0..3 {
            h.auth
                .sessions()
                .issue_token_pair(&account, None, None)
                .await
                .unwrap();
        }

        h.auth.logout(account.id, None).await.unwrap();
        assert!(h.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_requires_live_session() {
        let h = harness();
        let account = register_verified_jane(&h).await;
        let pair = h
            .auth
            .sessions()
            .issue_token_pair(&account, None, None)
            .await
            .unwrap();

        let authed = h
            .auth
            .authenticate(&pair.access_token, &pair.refresh_token)
            .await
            .unwrap();
        assert_eq!(authed.id, account.id);

        // Revoking the refresh token kills the access token early
        h.auth.sessions().revoke(&pair.refresh_token).await.unwrap();
        let result = h
            .auth
            .authenticate(&pair.access_token, &pair.refresh_token)
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_mismatched_pair() {
        let h = harness();
        let jane = register_verified_jane(&h).await;
        let other = h
            .auth
            .register(
                "Someone Else".to_string(),
                "other@x.com",
                None,
                "Their!Pass1",
                Some("https://x"),
            )
            .await
            .unwrap();
        let other_token = h.sender.last_token().unwrap();
        h.auth.verify_email(&other_token).await.unwrap();

        let jane_pair = h
            .auth
            .sessions()
            .issue_token_pair(&jane, None, None)
            .await
            .unwrap();
        let other_pair = h
            .auth
            .sessions()
            .issue_token_pair(&other, None, None)
            .await
            .unwrap();

        // Jane's access token with the other account's refresh token
        let result = h
            .auth
            .authenticate(&jane_pair.access_token, &other_pair.refresh_token)
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}

//! Authentication Models
//!
//! Token pair, access-token claims, and the per-request identity
//! extracted by the auth middleware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;

/// Access + refresh token pair returned on successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived signed access token
    pub access_token: String,

    /// Long-lived opaque refresh token, returned in plaintext exactly once
    pub refresh_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Access token expiration time in seconds
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// JWT claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject - account ID
    pub sub: String,

    /// Account email at issuance time
    pub email: String,

    /// Issuer (the app name)
    pub iss: String,

    /// Audience (the app name)
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn new(
        account: &Account,
        app_name: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iss: app_name.to_string(),
            aud: app_name.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

/// Authenticated identity attached to a request by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
}

impl CurrentUser {
    /// Build from validated access-token claims
    pub fn from_claims(claims: &AccessTokenClaims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            email: claims.email.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{EmailVerification, Lockout, PasswordCredential};

    fn test_account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            email_verification: EmailVerification::default(),
            password_credential: PasswordCredential::default(),
            lockout: Lockout::default(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_pair_creation() {
        let pair = TokenPair::new("access".to_string(), "refresh".to_string(), 900);

        assert_eq!(pair.access_token, "access");
        assert_eq!(pair.refresh_token, "refresh");
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn test_access_claims_creation() {
        let account = test_account();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::minutes(15);

        let claims = AccessTokenClaims::new(&account, "auth-service", now, expires_at);

        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.email, account.email);
        assert_eq!(claims.iss, "auth-service");
        assert_eq!(claims.aud, "auth-service");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn test_current_user_from_claims() {
        let account = test_account();
        let now = Utc::now();
        let claims =
            AccessTokenClaims::new(&account, "auth-service", now, now + chrono::Duration::minutes(15));

        let current = CurrentUser::from_claims(&claims).unwrap();
        assert_eq!(current.user_id, account.id);
        assert_eq!(current.email, account.email);
    }
}

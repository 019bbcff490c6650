//! Access-Token Codec
//!
//! Stateless signing and verification of short-lived bearer tokens.
//! Issuer and audience are both the configured app name; the algorithm
//! is pinned to HS256.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::config::JwtConfig;
use crate::models::{AccessTokenClaims, Account};
use crate::utils::error::{AppError, AppResult};

const GENERIC_TOKEN_ERROR: &str = "Invalid or expired token";

/// Codec for signed access tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    app_name: String,
    expires_in: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self::with_expiry(config, Duration::minutes(config.access_token_minutes))
    }

    /// Create a codec with a custom expiry window
    pub fn with_expiry(config: &JwtConfig, expires_in: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            app_name: config.app_name.clone(),
            expires_in,
        }
    }

    /// Access-token lifetime in seconds, for response payloads
    pub fn expires_in_seconds(&self) -> i64 {
        self.expires_in.num_seconds()
    }

    /// Issue a signed access token for the account
    pub fn issue(&self, account: &Account) -> AppResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims::new(account, &self.app_name, now, now + self.expires_in);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))
    }

    /// Verify a token's signature, algorithm, issuer, audience, and expiry
    ///
    /// Every failure collapses to the same generic error so callers can't
    /// distinguish sub-reasons; the underlying cause is only logged.
    pub fn verify(&self, token: &str) -> AppResult<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.app_name]);
        validation.set_audience(&[&self.app_name]);

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Access token rejected: {}", e);
                AppError::Unauthorized(GENERIC_TOKEN_ERROR.to_string())
            })
    }
}

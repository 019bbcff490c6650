//! Verification Tokens
//!
//! Single-use, time-limited secrets proving control of an email address
//! or authorizing a password reset. The plaintext is handed out exactly
//! once; only the SHA-256 digest and expiry are persisted. The consuming
//! operation clears the stored fields in the same update that applies the
//! token's effect, so a token can never be replayed.

use chrono::{DateTime, Duration, Utc};

use crate::utils::crypto::{generate_token, hash_token};

/// Byte length of verification-token material (64 hex chars)
const TOKEN_BYTES: usize = 32;

/// A freshly generated verification token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Returned to the caller once, never stored
    pub plaintext: String,

    /// SHA-256 digest persisted on the account
    pub hashed: String,

    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Generate a token valid for `ttl` from now
    pub fn generate(ttl: Duration) -> IssuedToken {
        let plaintext = generate_token(TOKEN_BYTES);
        let hashed = hash_token(&plaintext);
        IssuedToken {
            plaintext,
            hashed,
            expires_at: Utc::now() + ttl,
        }
    }
}

/// Check a caller-supplied token against the stored digest and expiry
///
/// Matches iff the digest of `provided` equals the stored hash and the
/// expiry is still in the future. Absent hash or expiry never matches.
pub fn token_matches(
    provided: &str,
    stored_hash: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match (stored_hash, expires_at) {
        (Some(stored), Some(expiry)) => expiry > now && hash_token(provided) == stored,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let token = IssuedToken::generate(Duration::days(1));

        assert_eq!(token.plaintext.len(), 2 * TOKEN_BYTES);
        assert_eq!(token.hashed.len(), 64);
        assert_eq!(token.hashed, hash_token(&token.plaintext));
        assert!(token.expires_at > Utc::now());
    }

    #[test]
    fn test_token_matches() {
        let now = Utc::now();
        let token = IssuedToken::generate(Duration::minutes(30));

        assert!(token_matches(
            &token.plaintext,
            Some(&token.hashed),
            Some(token.expires_at),
            now
        ));
    }

    #[test]
    fn test_wrong_plaintext_does_not_match() {
        let now = Utc::now();
        let token = IssuedToken::generate(Duration::minutes(30));

        assert!(!token_matches(
            "0000",
            Some(&token.hashed),
            Some(token.expires_at),
            now
        ));
    }

    #[test]
    fn test_expired_token_does_not_match() {
        let now = Utc::now();
        let token = IssuedToken::generate(Duration::minutes(30));

        assert!(!token_matches(
            &token.plaintext,
            Some(&token.hashed),
            Some(now - Duration::seconds(1)),
            now
        ));
    }

    #[test]
    fn test_cleared_fields_never_match() {
        let now = Utc::now();
        let token = IssuedToken::generate(Duration::minutes(30));

        assert!(!token_matches(&token.plaintext, None, None, now));
        assert!(!token_matches(
            &token.plaintext,
            Some(&token.hashed),
            None,
            now
        ));
        assert!(!token_matches(
            &token.plaintext,
            None,
            Some(token.expires_at),
            now
        ));
    }
}

//! Crypto Primitives
//!
//! Random token generation, one-way token hashing, and password hashing.

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Default bcrypt cost for password hashing
pub const DEFAULT_BCRYPT_COST: u32 = DEFAULT_COST;

/// Generate a cryptographically secure random token, hex-encoded
///
/// The returned string is `2 * byte_length` characters long. A zero
/// length yields the empty string.
pub fn generate_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hash a token using SHA-256 for at-rest storage
///
/// Deterministic, so lookups can match on the digest. Never used for
/// password storage.
pub fn hash_token(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password using bcrypt with the given cost factor
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against an optional stored hash
///
/// Returns `false` when no hash is stored (pure OAuth accounts) or when
/// the stored hash is malformed; a password check must never error out
/// of a login flow.
pub fn verify_password(password: &str, password_hash: Option<&str>) -> bool {
    match password_hash {
        Some(stored) => verify(password, stored).unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_length() {
        for byte_length in [0, 1, 16, 40] {
            let token = generate_token(byte_length);
            assert_eq!(token.len(), 2 * byte_length);
            assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let a = generate_token(32);
        let b = generate_token(32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_deterministic() {
        let digest1 = hash_token("some-token");
        let digest2 = hash_token("some-token");
        assert_eq!(digest1, digest2);
        assert_eq!(digest1.len(), 64); // SHA-256 hex digest

        let other = hash_token("other-token");
        assert_ne!(digest1, other);
    }

    #[test]
    fn test_password_hashing_round_trip() {
        let hashed = hash_password("Str0ng!Pass", 4).unwrap();
        assert!(verify_password("Str0ng!Pass", Some(&hashed)));
        assert!(!verify_password("wrong-password", Some(&hashed)));
    }

    #[test]
    fn test_verify_password_without_hash() {
        assert!(!verify_password("anything", None));
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        assert!(!verify_password("anything", Some("not-a-bcrypt-hash")));
    }

    #[test]
    fn test_same_password_different_salts() {
        let first = hash_password("SamePassword1!", 4).unwrap();
        let second = hash_password("SamePassword1!", 4).unwrap();
        assert_ne!(first, second);
        assert!(verify_password("SamePassword1!", Some(&first)));
        assert!(verify_password("SamePassword1!", Some(&second)));
    }
}

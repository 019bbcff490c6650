//! Login-Exchange Cache
//!
//! Bridges OAuth redirect callbacks to token retrieval: after a provider
//! callback authenticates a user, the issued token pair is parked here
//! under a one-time random code with a short TTL, and the code travels
//! back to the frontend via redirect. The frontend then trades the code
//! for the tokens exactly once.
//!
//! This is the one piece of process-wide mutable state in the core. It is
//! an injected, explicitly-owned component; entries are dropped lazily on
//! lookup and by a periodic sweep task. Codes do not survive a process
//! restart, which is acceptable: they are short-lived and reissued on
//! failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;

use crate::models::{Account, TokenPair};
use crate::utils::crypto::generate_token;

const CODE_BYTES: usize = 20;

/// An authenticated account with its freshly issued tokens
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub account: Account,
    pub tokens: TokenPair,
}

struct ExchangeEntry {
    grant: LoginGrant,
    expires_at: DateTime<Utc>,
}

/// One-time-code cache for OAuth login grants
pub struct LoginExchangeCache {
    entries: Mutex<HashMap<String, ExchangeEntry>>,
    ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LoginExchangeCache {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds),
            sweeper: Mutex::new(None),
        }
    }

    /// Park a grant and return its one-time code
    pub fn stash(&self, account: Account, tokens: TokenPair) -> String {
        let code = generate_token(CODE_BYTES);
        let entry = ExchangeEntry {
            grant: LoginGrant { account, tokens },
            expires_at: Utc::now() + self.ttl,
        };

        self.entries.lock().unwrap().insert(code.clone(), entry);
        code
    }

    /// Consume a code, returning its grant if the code is live
    ///
    /// The entry is removed whether or not it has expired; a code can
    /// never be presented twice.
    pub fn take(&self, code: &str) -> Option<LoginGrant> {
        let entry = self.entries.lock().unwrap().remove(code)?;
        if entry.expires_at > Utc::now() {
            Some(entry.grant)
        } else {
            None
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of parked entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep task
    ///
    /// The task holds only a weak reference, so dropping the cache stops
    /// the sweeper on its own; `stop_sweeper` stops it deterministically.
    pub fn start_sweeper(self: &Arc<Self>, period: std::time::Duration) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            log::debug!("Swept {} expired login codes", removed);
                        }
                    }
                    None => break,
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the periodic sweep task, if running
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for LoginExchangeCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::{EmailVerification, Lockout, PasswordCredential};
    use uuid::Uuid;

    fn test_grant_parts() -> (Account, TokenPair) {
        let now = Utc::now();
        let account = Account {
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
        };
        let tokens = TokenPair::new("access".to_string(), "refresh".to_string(), 900);
        (account, tokens)
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let cache = LoginExchangeCache::new(60);
        let (account, tokens) = test_grant_parts();

        let code = cache.stash(account.clone(), tokens);
        assert_eq!(code.len(), 2 * CODE_BYTES);

        let grant = cache.take(&code).unwrap();
        assert_eq!(grant.account.id, account.id);

        // Second presentation of the same code fails
        assert!(cache.take(&code).is_none());
    }

    #[tokio::test]
    async fn test_unknown_code_fails() {
        let cache = LoginExchangeCache::new(60);
        assert!(cache.take("no-such-code").is_none());
    }

    #[tokio::test]
    async fn test_expired_code_fails_and_is_removed() {
        let cache = LoginExchangeCache::new(0);
        let (account, tokens) = test_grant_parts();

        let code = cache.stash(account, tokens);
        assert!(cache.take(&code).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let expired = LoginExchangeCache::new(0);
        let (account, tokens) = test_grant_parts();
        expired.stash(account.clone(), tokens.clone());
        assert_eq!(expired.sweep(), 1);
        assert!(expired.is_empty());

        let live = LoginExchangeCache::new(60);
        live.stash(account, tokens);
        assert_eq!(live.sweep(), 0);
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_task_lifecycle() {
        let cache = Arc::new(LoginExchangeCache::new(0));
        let (account, tokens) = test_grant_parts();
        cache.stash(account, tokens);

        cache.start_sweeper(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(cache.is_empty());
        cache.stop_sweeper();
    }
}

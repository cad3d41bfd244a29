// src/ledger/token_cache.rs
//! Per-organization admin-token cache.
//!
//! Tokens carry a declared time-to-live, after which they are treated as
//! absent. Refreshing a token for an organization is single-flight: the
//! per-organization mutex coalesces concurrent re-enrollments so requests
//! never observe a just-invalidated token mid-swap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

struct CachedToken {
    token: String,
    acquired_at: Instant,
}

/// Token store keyed by organization name.
pub struct TokenCache {
    ttl: Duration,
    tokens: RwLock<HashMap<String, CachedToken>>,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[allow(dead_code)]
impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        TokenCache {
            ttl,
            tokens: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached token for `org` if present and within its TTL.
    pub async fn get_fresh(&self, org: &str) -> Option<String> {
        let tokens = self.tokens.read().await;
        tokens.get(org).and_then(|cached| {
            if cached.acquired_at.elapsed() < self.ttl {
                Some(cached.token.clone())
            } else {
                None
            }
        })
    }

    /// Stores a freshly enrolled token for `org`, restarting its TTL.
    pub async fn store(&self, org: &str, token: String) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(
            org.to_string(),
            CachedToken {
                token,
                acquired_at: Instant::now(),
            },
        );
    }

    /// Drops the cached token for `org`, if any.
    pub async fn invalidate(&self, org: &str) {
        let mut tokens = self.tokens.write().await;
        tokens.remove(org);
    }

    /// Hands out the per-organization refresh mutex. Callers hold it
    /// across re-check and re-enrollment so only one enrollment is in
    /// flight per organization.
    pub async fn refresh_lock(&self, org: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(org.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_returns_fresh_token() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.store("akademik", "tok-1".to_string()).await;
        assert_eq!(cache.get_fresh("akademik").await.as_deref(), Some("tok-1"));
        assert_eq!(cache.get_fresh("rektor").await, None);
    }

    #[tokio::test]
    async fn expired_token_reads_as_absent() {
        let cache = TokenCache::new(Duration::from_millis(0));
        cache.store("akademik", "tok-1".to_string()).await;
        assert_eq!(cache.get_fresh("akademik").await, None);
    }

    #[tokio::test]
    async fn invalidate_drops_token() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.store("akademik", "tok-1".to_string()).await;
        cache.invalidate("akademik").await;
        assert_eq!(cache.get_fresh("akademik").await, None);
    }

    #[tokio::test]
    async fn refresh_lock_is_shared_per_org() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let a = cache.refresh_lock("akademik").await;
        let b = cache.refresh_lock("akademik").await;
        assert!(Arc::ptr_eq(&a, &b));

        let guard = a.lock().await;
        assert!(b.try_lock().is_err());
        drop(guard);
        assert!(b.try_lock().is_ok());
    }
}

//! Session Store
//!
//! Key/value cache contract backing token revocation. A token is only
//! authenticated while its entry `auth:{user-id}:{token-id}` is present; the
//! value is the owning user id. Entries are written once by the issuer and
//! never mutated, so their TTL counts down to the token's own expiry.
//!
//! Two adapters ship with the crate: [`RedisSessionStore`] for production and
//! [`InMemorySessionStore`] for tests. [`TimedStore`] wraps either one and
//! bounds every round-trip so a slow store fails fast instead of hanging a
//! request. Pattern deletion walks the whole keyspace, so it gets its own,
//! longer bound.

pub mod memory;
pub mod redis;

pub use self::memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Prefix of every session entry
pub const AUTH_PREFIX: &str = "auth";

/// Prefix of cached user profiles
pub const USER_PREFIX: &str = "users";

/// Session store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session store backend error: {0}")]
    Backend(String),

    #[error("session store timed out after {0:?}")]
    Timeout(Duration),
}

/// Key/value store with per-key TTL and pattern deletion
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a value, `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError>;

    /// Delete every key matching `pattern` (a prefix followed by `*`).
    ///
    /// Returns once all matched keys are gone. Keys created while the
    /// deletion is running may survive.
    async fn delete_by_prefix(&self, pattern: &str) -> Result<usize, StoreError>;
}

/// `auth:{user-id}:{token-id}`
pub fn session_key(user_id: Uuid, token_id: Uuid) -> String {
    format!("{}:{}:{}", AUTH_PREFIX, user_id, token_id)
}

/// `auth:{user-id}:*`
pub fn user_sessions_pattern(user_id: Uuid) -> String {
    format!("{}:{}:*", AUTH_PREFIX, user_id)
}

/// `users:{user-id}`
pub fn user_cache_key(user_id: Uuid) -> String {
    format!("{}:{}", USER_PREFIX, user_id)
}

/// Run a store operation under a deadline
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Store decorator bounding every call by a fixed deadline.
///
/// Single-key calls share `limit`; `delete_by_prefix` is bounded by
/// `bulk_limit` since it spans many round-trips.
pub struct TimedStore {
    inner: Arc<dyn SessionStore>,
    limit: Duration,
    bulk_limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn SessionStore>, limit: Duration, bulk_limit: Duration) -> Self {
        Self {
            inner,
            limit,
            bulk_limit,
        }
    }
}

#[async_trait]
impl SessionStore for TimedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        with_timeout(self.limit, self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        with_timeout(self.limit, self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, StoreError> {
        with_timeout(self.limit, self.inner.delete(keys)).await
    }

    async fn delete_by_prefix(&self, pattern: &str) -> Result<usize, StoreError> {
        with_timeout(self.bulk_limit, self.inner.delete_by_prefix(pattern)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledStore;

    #[async_trait]
    impl SessionStore for StalledStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn delete(&self, _keys: &[String]) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn delete_by_prefix(&self, _pattern: &str) -> Result<usize, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0)
        }
    }

    /// Pattern deletion that takes several single-call deadlines to finish
    struct SlowScanStore;

    #[async_trait]
    impl SessionStore for SlowScanStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _keys: &[String]) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn delete_by_prefix(&self, _pattern: &str) -> Result<usize, StoreError> {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(15)).await;
            }
            Ok(7)
        }
    }

    #[test]
    fn test_key_scheme() {
        let user = Uuid::new_v4();
        let token = Uuid::new_v4();

        assert_eq!(session_key(user, token), format!("auth:{}:{}", user, token));
        assert_eq!(user_sessions_pattern(user), format!("auth:{}:*", user));
        assert_eq!(user_cache_key(user), format!("users:{}", user));
    }

    #[tokio::test]
    async fn test_timed_store_fails_fast() {
        let store = TimedStore::new(
            Arc::new(StalledStore),
            Duration::from_millis(20),
            Duration::from_millis(100),
        );

        let err = store.get("auth:x:y").await.unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(20)));

        let err = store
            .set("auth:x:y", "x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));

        let err = store.delete_by_prefix("auth:x:*").await.unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_delete_uses_the_bulk_limit() {
        let store = TimedStore::new(
            Arc::new(SlowScanStore),
            Duration::from_millis(20),
            Duration::from_millis(500),
        );

        assert_eq!(store.delete_by_prefix("auth:x:*").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_timed_store_passes_through() {
        let inner = Arc::new(InMemorySessionStore::new());
        let store = TimedStore::new(
            inner.clone(),
            Duration::from_millis(200),
            Duration::from_secs(2),
        );

        store
            .set("auth:u:t", "u", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(store.get("auth:u:t").await.unwrap(), Some("u".to_string()));
        assert_eq!(inner.get("auth:u:t").await.unwrap(), Some("u".to_string()));
    }
}

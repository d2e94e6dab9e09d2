//! Cache backends for the [`Cache`](crate::middleware::Cache) decorator
//!
//! The decorator owns no storage of its own: entries, expiry and eviction all
//! belong to the backend. A backend must tell a plain miss apart from any other
//! failure, because the decorator treats the two very differently.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[cfg(feature = "redis")]
use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};

#[cfg(feature = "redis")]
use crate::{
    config::RedisConfig,
    error::{Error, Result},
};

/// Cache lookup/store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Key not present (or expired)
    #[error("cache miss")]
    Miss,

    /// Anything else: connection, protocol, timeout
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// External key/value store holding serialized responses
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the bytes stored under `key`
    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, CacheError>;

    /// Store `value` under `key` for `ttl`, a zero `ttl` meaning no expiry
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError>;
}

#[async_trait]
impl<B: CacheBackend + ?Sized> CacheBackend for Arc<B> {
    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, CacheError> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache backed by a concurrent map
///
/// Clones share the same storage. Expired entries read as a miss and are
/// dropped lazily on access. A zero TTL stores the entry without expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet dropped
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Err(CacheError::Miss)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };

        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

/// Redis-backed cache
///
/// Entries live under an optional key prefix. A non-zero TTL is stored with
/// `SETEX`, rounded up to whole seconds; a zero TTL uses plain `SET` and never
/// expires, as with [`InMemoryCache`].
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    key_prefix: String,
}

#[cfg(feature = "redis")]
impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            key_prefix: String::new(),
        }
    }

    pub fn with_prefix(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: prefix.into(),
        }
    }

    /// Create the pool described by `config` and wrap it
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::with_prefix(pool, config.key_prefix.clone()))
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> std::result::Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to get Redis connection: {}", e)))
    }
}

/// Whole seconds for `SETEX`, `None` for a zero TTL
#[cfg(feature = "redis")]
fn ttl_secs(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0))
}

#[cfg(feature = "redis")]
#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, CacheError> {
        use deadpool_redis::redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn
            .get(self.cache_key(key))
            .await
            .map_err(|e: redis::RedisError| CacheError::Backend(e.to_string()))?;

        value.ok_or(CacheError::Miss)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        use deadpool_redis::redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let key = self.cache_key(key);
        let stored = match ttl_secs(ttl) {
            Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };

        stored.map_err(|e: redis::RedisError| CacheError::Backend(e.to_string()))
    }
}

#[cfg(feature = "redis")]
/// Delay before retry number `attempt` (1-based): `base`, `2 * base`, `4 * base`, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

#[cfg(feature = "redis")]
/// Run `connect` until it succeeds, at most `max_retries + 1` times
async fn with_backoff<T, F, Fut>(max_retries: u32, base: Duration, mut connect: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_retries => {
                tracing::error!(attempts = attempt + 1, "Giving up on Redis: {}", e);
                return Err(e);
            }
            Err(e) => {
                attempt += 1;
                let delay = backoff_delay(base, attempt);
                tracing::warn!(attempt, ?delay, "Redis unavailable: {}", e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Create a Redis connection pool, retrying with exponential backoff
#[cfg(feature = "redis")]
pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
    let base = Duration::from_secs(config.retry_delay_secs);
    let pool = with_backoff(config.max_retries, base, || try_create_pool(config)).await?;

    tracing::info!(max_connections = config.max_connections, "Redis pool ready");
    Ok(pool)
}

#[cfg(feature = "redis")]
async fn try_create_pool(config: &RedisConfig) -> Result<Pool> {
    let pool = DeadpoolConfig::from_url(&config.url)
        .builder()
        .map_err(|e| Error::Internal(format!("Invalid Redis URL '{}': {}", config.url, e)))?
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build Redis pool: {}", e)))?;

    // fail here rather than on the first request
    pool.get()
        .await
        .map_err(|e| Error::Internal(format!("Failed to reach Redis: {}", e)))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_miss_then_hit() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("/users").await, Err(CacheError::Miss));

        cache
            .set("/users", b"[1,2]".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("/users").await.unwrap(), b"[1,2]".to_vec());
    }

    #[tokio::test]
    async fn test_in_memory_expired_entry_is_miss_and_dropped() {
        let cache = InMemoryCache::new();
        cache
            .set("/users", b"[]".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("/users").await, Err(CacheError::Miss));
        assert!(!cache.contains_key("/users"));
    }

    #[tokio::test]
    async fn test_in_memory_zero_ttl_never_expires() {
        let cache = InMemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), b"v".to_vec());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = InMemoryCache::new();
        let other = cache.clone();
        other.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_millis(1)), Some(1));
        assert_eq!(ttl_secs(Duration::from_millis(1500)), Some(2));
        assert_eq!(ttl_secs(Duration::from_secs(300)), Some(300));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_zero_ttl_means_no_expiry() {
        assert_eq!(ttl_secs(Duration::ZERO), None);
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(2);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 4), Duration::from_secs(16));
        assert_eq!(backoff_delay(Duration::ZERO, 9), Duration::ZERO);
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_backoff_gives_up_after_max_retries() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_backoff(3, Duration::ZERO, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(crate::error::Error::Internal("refused".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_backoff_returns_first_success() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let attempts = AtomicU32::new(0);
        let result = with_backoff(5, Duration::ZERO, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(crate::error::Error::Internal("refused".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}

//! Redis cache manager for rate limiting and shared counters
//!
//! All writes are atomic primitives: INCR with a TTL set on the first
//! increment, and SET NX EX for locks. There is no read-modify-write path.

use deadpool_redis::{redis::AsyncCommands, Pool as RedisPool};
use std::time::Duration;

use crate::{DbError, DbResult};

/// Cache key prefixes for organization
pub mod keys {
    pub const RATE_LIMIT: &str = "rate:";
    pub const LOCK: &str = "lock:";
}

#[derive(Clone)]
pub struct CacheManager {
    pool: RedisPool,
}

impl CacheManager {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Connect straight to a Redis URL, verifying the connection with a PING.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let cfg = deadpool_redis::Config::from_url(url);
        let pool = cfg
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| DbError::Connection(format!("Redis: {e}")))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| DbError::Connection(format!("Redis pool: {e}")))?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| DbError::Connection(format!("Redis ping: {e}")))?;

        Ok(Self::new(pool))
    }

    /// Increment a rate-limit counter, returning the post-increment count.
    ///
    /// The TTL is set only when the key is created, so the window expires at
    /// a fixed distance from its first request regardless of later traffic.
    pub async fn rate_limit_incr(&self, identifier: &str, window_secs: u64) -> DbResult<i64> {
        let mut conn = self.pool.get().await?;

        let key = format!("{}{}", keys::RATE_LIMIT, identifier);

        let count: i64 = conn.incr(&key, 1).await?;

        if count == 1 {
            let _: () = conn.expire(&key, window_secs as i64).await?;
        }

        Ok(count)
    }

    /// Read a rate-limit counter without touching it.
    pub async fn rate_limit_count(&self, identifier: &str) -> DbResult<i64> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", keys::RATE_LIMIT, identifier);
        let count: Option<i64> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Acquire a short-lived distributed lock via SET NX EX.
    pub async fn acquire_lock(&self, resource: &str, ttl: Duration) -> DbResult<bool> {
        let mut conn = self.pool.get().await?;

        let key = format!("{}{}", keys::LOCK, resource);
        let result: Option<String> = deadpool_redis::redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| DbError::Redis(e.to_string()))?;

        Ok(result.is_some())
    }

    /// Release a previously acquired lock.
    pub async fn release_lock(&self, resource: &str) -> DbResult<bool> {
        let mut conn = self.pool.get().await?;
        let key = format!("{}{}", keys::LOCK, resource);
        let deleted: i32 = conn.del(&key).await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_redis::{Config as RedisConfig, Runtime};

    fn test_cache() -> CacheManager {
        let cfg = RedisConfig::from_url("redis://localhost:6379");
        CacheManager::new(cfg.create_pool(Some(Runtime::Tokio1)).unwrap())
    }

    #[tokio::test]
    #[ignore = "requires a local Redis"]
    async fn incr_counts_within_window() {
        let cache = test_cache();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        assert_eq!(cache.rate_limit_incr(&key, 60).await.unwrap(), 1);
        assert_eq!(cache.rate_limit_incr(&key, 60).await.unwrap(), 2);
        assert_eq!(cache.rate_limit_count(&key).await.unwrap(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a local Redis"]
    async fn lock_is_exclusive() {
        let cache = test_cache();
        let resource = format!("test:{}", uuid::Uuid::new_v4());

        assert!(cache
            .acquire_lock(&resource, Duration::from_secs(10))
            .await
            .unwrap());
        assert!(!cache
            .acquire_lock(&resource, Duration::from_secs(10))
            .await
            .unwrap());
        assert!(cache.release_lock(&resource).await.unwrap());
    }
}

//! # Configuration Cache
//!
//! Keyed store for resolved configuration values with a time-to-live.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CacheStore (trait)                                                     │
//! │  ├── RedisCache   - shared across gateway processes (production)       │
//! │  └── MemoryCache  - RwLock<HashMap> in this process (dev, tests)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are opaque strings (the resolver stores JSON). Keys follow
//! `cell:cfg:{tenant}:{kind}:{key}`, so every entry of one tenant and table
//! can be dropped by prefix.
//!
//! Callers treat every [`CacheError`] as a miss; the cache is never the
//! source of truth.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend can't be reached.
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),

    /// The backend rejected a command.
    #[error("Cache command failed: {0}")]
    CommandFailed(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            CacheError::ConnectionFailed(err.to_string())
        } else {
            CacheError::CommandFailed(err.to_string())
        }
    }
}

/// A keyed string store with expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Unexpired value for `key`, if any.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Stores `value` under `key` for `ttl`. Last write wins.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Drops every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64>;

    /// Round trip to the backend, for health checks.
    async fn ping(&self) -> CacheResult<()>;

    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

// =============================================================================
// In-process cache
// =============================================================================

/// Cache held in this process.
///
/// Expired entries are invisible to `get` and are swept on `set`.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|(_, expires)| *expires > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().await;

        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let expires = now
            .checked_add(ttl)
            .ok_or_else(|| CacheError::CommandFailed(format!("ttl out of range: {ttl:?}")))?;
        let mut entries = self.entries.write().await;

        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Redis cache
// =============================================================================

/// Cache backed by Redis.
///
/// `ConnectionManager` reconnects on its own; clones share one multiplexed
/// connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Connected to Redis cache");
        Ok(RedisCache { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        // SET EX rejects 0
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let count: u64 = conn.del(&keys).await?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix = %prefix, removed, "Dropped cache entries by prefix");
        Ok(removed)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = MemoryCache::new();
        cache.set("k", "first", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "second", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected() {
        let cache = MemoryCache::new();

        let err = cache.set("k", "v", Duration::from_secs(u64::MAX)).await.unwrap_err();
        assert!(matches!(err, CacheError::CommandFailed(_)));
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_prefix_scopes_to_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("cell:cfg:t1:fee_tier:10", "a", ttl).await.unwrap();
        cache.set("cell:cfg:t1:fee_tier:2000", "b", ttl).await.unwrap();
        cache.set("cell:cfg:t1:region:NG", "c", ttl).await.unwrap();
        cache.set("cell:cfg:t2:fee_tier:10", "d", ttl).await.unwrap();

        let removed = cache.delete_prefix("cell:cfg:t1:fee_tier:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("cell:cfg:t1:region:NG").await.unwrap().is_some());
        assert!(cache.get("cell:cfg:t2:fee_tier:10").await.unwrap().is_some());

        cache.delete("cell:cfg:t1:region:NG").await.unwrap();
        assert!(cache.get("cell:cfg:t1:region:NG").await.unwrap().is_none());
    }
}

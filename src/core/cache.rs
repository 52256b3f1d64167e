//! Cache port - Injected key/value cache for stock hints.
//!
//! Components receive an `Arc<dyn CachePort>` instead of reaching for a global
//! client. Callers treat every cache failure as a miss: the database stays the
//! source of truth, so removing the cache can only change latency.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

/// Errors reported by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Minimal counter cache used for stock hints.
#[async_trait]
pub trait CachePort: Send + Sync {
    /// Reads a value; `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Stores a value with an optional lifetime.
    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Adds `delta` to an existing value and returns the new value; `None` if the key is absent.
    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError>;

    /// Removes a value.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local cache backed by a `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let entries = self.entries.read().await;
        let hit = entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value);
        trace!(key, ?hit, "cache get");
        Ok(hit)
    }

    async fn set(&self, key: &str, value: i64, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.value += delta;
                Ok(Some(entry.value))
            }
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CachePort for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<i64>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: i64, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn increment(&self, _key: &str, _delta: i64) -> Result<Option<i64>, CacheError> {
        Ok(None)
    }

    async fn invalidate(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

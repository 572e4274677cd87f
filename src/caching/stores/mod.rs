//! # Cache Stores Module
//!
//! The `CacheStore` trait and its in-memory and Redis implementations.
//! Stores deal in raw bytes; typing happens in the cache manager.

pub mod memory;
pub mod redis_store;

pub use memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis_store::{RedisCache, RedisCacheConfig};

use super::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Cache entry with expiry metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value
    pub value: Vec<u8>,

    /// When the entry stops being served
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Check if the entry is expired
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Byte store behind the cache manager
///
/// Pattern arguments are plain substrings of the logical key, never globs.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value from the cache. Expired entries read as `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key` until `ttl` elapses
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Delete every key containing `pattern`, returning how many were removed
    async fn delete_matching(&self, pattern: &str) -> CacheResult<usize>;

    /// Count live keys containing `pattern`
    async fn count_matching(&self, pattern: &str) -> CacheResult<usize>;

    /// Remove every entry, including keys outside the namespace
    async fn clear(&self) -> CacheResult<()>;

    /// Counters since the store was created
    async fn stats(&self) -> CacheResult<CacheStoreStats>;

    /// Whether the backend answers
    async fn health_check(&self) -> CacheResult<bool>;

    /// Short backend name reported in stats ("memory", "redis")
    fn backend_name(&self) -> &'static str;
}

/// Store-level counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStoreStats {
    /// Number of entries
    pub entries: usize,

    /// Number of hits
    pub hits: u64,

    /// Number of misses
    pub misses: u64,

    /// Number of evictions
    pub evictions: u64,

    /// Number of expired entries cleaned up
    pub expired_cleanups: u64,
}

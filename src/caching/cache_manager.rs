//! # Cache Manager
//!
//! Read-through facade over a `CacheStore`. Values are serialized as JSON, so
//! any `Serialize + DeserializeOwned` payload can be cached.
//!
//! ## Single-flight
//!
//! `get_or_compute` takes a per-key async lock on a miss and re-checks the
//! store once it holds the lock. Concurrent misses for one key therefore run
//! the producer once; the other callers read what the first one stored.
//!
//! ## Best-effort storage
//!
//! Store failures on read or write are logged and treated as a miss or a
//! skipped write. A broken cache backend slows requests down, it never fails them.

use super::stores::{InMemoryCache, InMemoryCacheConfig, RedisCache, RedisCacheConfig};
use super::{CacheError, CacheResult, CacheStore};
use crate::core::error::PokedexError;
use crate::observability::metrics;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Which store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = PokedexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(PokedexError::config(format!(
                "Unknown cache backend '{}', expected 'memory' or 'redis'",
                other
            ))),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store implementation
    pub backend: CacheBackend,

    /// TTL applied to upstream payloads
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Prefix shared by every key; a namespace-wide invalidation removes them all
    pub namespace: String,

    /// In-memory store settings
    pub memory: InMemoryCacheConfig,

    /// Redis store settings
    pub redis: RedisCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl: Duration::from_secs(24 * 60 * 60),
            namespace: "pokemon".to_string(),
            memory: InMemoryCacheConfig::default(),
            redis: RedisCacheConfig::default(),
        }
    }
}

/// Cache statistics reported to operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries in the namespace
    pub total_cached_items: usize,

    /// Configured TTL in seconds
    pub cache_ttl: u64,

    /// Active backend name
    pub cache_driver: String,

    /// Read-through hits since startup
    pub hits: u64,

    /// Read-through misses since startup
    pub misses: u64,

    /// Present when the backend could not be queried
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-through cache manager
pub struct CacheManager {
    config: CacheConfig,

    store: Arc<dyn CacheStore>,

    /// Per-key locks held while a producer runs
    fetch_locks: DashMap<String, Arc<Mutex<()>>>,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Create a cache manager with the configured backend
    pub async fn new(config: CacheConfig) -> CacheResult<Self> {
        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Memory => {
                info!(
                    "In-memory cache initialized with max {} entries",
                    config.memory.max_entries
                );
                Arc::new(InMemoryCache::new(config.memory.clone()))
            }
            CacheBackend::Redis => {
                let store = RedisCache::new(config.redis.clone()).await?;
                info!("Redis cache initialized at {}", config.redis.url);
                Arc::new(store)
            }
        };

        if config.namespace.is_empty() {
            return Err(CacheError::Configuration {
                message: "Cache namespace cannot be empty".to_string(),
            });
        }

        Ok(Self::with_store(config, store))
    }

    /// Create a cache manager over an existing store
    pub fn with_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            store,
            fetch_locks: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Return the cached value for `key`, or run `producer`, store its value and return it
    ///
    /// Producer errors propagate unchanged and nothing is cached for them.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.lookup(key).await {
            self.record_hit(key);
            return Ok(value);
        }

        let lock = self
            .fetch_locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // Another caller may have filled the key while we waited
        if let Some(value) = self.lookup(key).await {
            drop(guard);
            drop(lock);
            self.release_lock(key);
            self.record_hit(key);
            return Ok(value);
        }

        self.record_miss(key);
        let result = producer().await;

        if let Ok(value) = &result {
            self.store_value(key, value, ttl).await;
        }

        drop(guard);
        drop(lock);
        self.release_lock(key);
        result
    }

    /// Remove entries whose key contains `pattern`, or the whole namespace
    ///
    /// Backend failures are logged and reported as `false`, never raised.
    pub async fn invalidate(&self, pattern: Option<&str>) -> bool {
        let target = pattern.unwrap_or(&self.config.namespace);

        match self.store.delete_matching(target).await {
            Ok(removed) => {
                info!(pattern = ?pattern, removed, "Pokemon cache cleared");
                true
            }
            Err(e) => {
                error!(pattern = ?pattern, error = %e, "Failed to clear Pokemon cache");
                false
            }
        }
    }

    /// Statistics for the cache namespace
    pub async fn stats(&self) -> CacheStats {
        let (total_cached_items, error) = match self.store.count_matching(&self.config.namespace).await {
            Ok(count) => (count, None),
            Err(e) => {
                error!(error = %e, "Failed to get cache stats");
                (0, Some(e.to_string()))
            }
        };

        CacheStats {
            total_cached_items,
            cache_ttl: self.config.ttl.as_secs(),
            cache_driver: self.store.backend_name().to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            error,
        }
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    let _ = self.store.delete(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value).map_err(CacheError::from) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        if let Err(e) = self.store.set(key, &bytes, ttl).await {
            warn!(key = %key, error = %e, "Cache write failed, value not cached");
        }
    }

    fn release_lock(&self, key: &str) {
        self.fetch_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn record_hit(&self, key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit();
        debug!(key = %key, "Cache hit");
    }

    fn record_miss(&self, key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
        debug!(key = %key, "Cache miss");
    }
}

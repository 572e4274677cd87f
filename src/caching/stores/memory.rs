//! # In-Memory Cache Store
//!
//! A DashMap-backed store with passive expiry on read, a periodic cleanup task
//! for expired entries, and a max-entries bound that evicts the entry closest
//! to expiring when full.

use super::{CacheEntry, CacheStore, CacheStoreStats};
use crate::caching::CacheResult;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

/// In-memory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,

    /// Cleanup interval for expired entries
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// In-memory cache implementation
pub struct InMemoryCache {
    config: InMemoryCacheConfig,

    entries: Arc<DashMap<String, CacheEntry>>,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_cleanups: Arc<AtomicU64>,

    cleanup_task: tokio::task::JoinHandle<()>,
}

impl InMemoryCache {
    /// Create a new in-memory cache. Must be called inside a tokio runtime.
    pub fn new(config: InMemoryCacheConfig) -> Self {
        let entries = Arc::new(DashMap::new());
        let expired_cleanups = Arc::new(AtomicU64::new(0));

        let cleanup_task = {
            let entries = entries.clone();
            let expired_cleanups = expired_cleanups.clone();
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = interval(cleanup_interval);
                loop {
                    interval.tick().await;
                    Self::cleanup_expired_entries(&entries, &expired_cleanups);
                }
            })
        };

        Self {
            config,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_cleanups,
            cleanup_task,
        }
    }

    fn cleanup_expired_entries(entries: &DashMap<String, CacheEntry>, expired_cleanups: &AtomicU64) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let cleaned = before.saturating_sub(entries.len());

        if cleaned > 0 {
            expired_cleanups.fetch_add(cleaned as u64, Ordering::Relaxed);
            debug!("Cleaned up {} expired cache entries", cleaned);
        }
    }

    /// Make room for one new key
    fn evict_if_needed(&self, incoming_key: &str) {
        if self.entries.contains_key(incoming_key) || self.entries.len() < self.config.max_entries {
            return;
        }

        Self::cleanup_expired_entries(&self.entries, &self.expired_cleanups);
        if self.entries.len() < self.config.max_entries {
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Evicted cache entry closest to expiry");
        }
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        self.cleanup_task.abort();
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired && self.entries.remove_if(key, |_, e| e.is_expired()).is_some() {
            self.expired_cleanups.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.evict_if_needed(key);
        self.entries
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_matching(&self, pattern: &str) -> CacheResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn count_matching(&self, pattern: &str) -> CacheResult<usize> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().contains(pattern) && !entry.value().is_expired())
            .count())
    }

    async fn clear(&self) -> CacheResult<()> {
        let entry_count = self.entries.len();
        self.entries.clear();
        info!("Cleared {} entries from in-memory cache", entry_count);
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        Ok(CacheStoreStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_cleanups: self.expired_cleanups.load(Ordering::Relaxed),
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_basic_operations() {
        let cache = InMemoryCache::new(InMemoryCacheConfig::default());

        cache
            .set("pokemon_list_20_0", b"index", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            cache.get("pokemon_list_20_0").await.unwrap(),
            Some(b"index".to_vec())
        );

        assert!(cache.delete("pokemon_list_20_0").await.unwrap());
        assert_eq!(cache.get("pokemon_list_20_0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new(InMemoryCacheConfig::default());

        cache
            .set("expire_test", b"value", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get("expire_test").await.unwrap().is_some());

        sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("expire_test").await.unwrap(), None);

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.expired_cleanups, 1);
    }

    #[tokio::test]
    async fn test_pattern_operations() {
        let cache = InMemoryCache::new(InMemoryCacheConfig::default());
        let ttl = Duration::from_secs(60);

        cache.set("pokemon_list_20_0", b"a", ttl).await.unwrap();
        cache.set("pokemon_list_20_20", b"b", ttl).await.unwrap();
        cache.set("pokemon_details_abc", b"c", ttl).await.unwrap();
        cache.set("unrelated", b"d", ttl).await.unwrap();

        assert_eq!(cache.count_matching("pokemon").await.unwrap(), 3);
        assert_eq!(cache.delete_matching("list").await.unwrap(), 2);
        assert_eq!(cache.count_matching("pokemon").await.unwrap(), 1);
        assert!(cache.get("unrelated").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_eviction_prefers_soonest_expiry() {
        let config = InMemoryCacheConfig {
            max_entries: 2,
            ..Default::default()
        };
        let cache = InMemoryCache::new(config);

        cache.set("short", b"1", Duration::from_secs(10)).await.unwrap();
        cache.set("long", b"2", Duration::from_secs(1000)).await.unwrap();
        cache.set("new", b"3", Duration::from_secs(500)).await.unwrap();

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
        assert!(cache.get("new").await.unwrap().is_some());
        assert_eq!(cache.stats().await.unwrap().evictions, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = InMemoryCache::new(InMemoryCacheConfig::default());

        cache.set("key1", b"value1", Duration::from_secs(60)).await.unwrap();
        cache.get("key1").await.unwrap();
        cache.get("key2").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}

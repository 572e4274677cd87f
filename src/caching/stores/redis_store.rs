//! # Redis Cache Store
//!
//! Redis-backed store. Every key is namespaced with a configurable prefix, TTLs
//! are enforced by Redis (`SET EX`), and pattern operations walk the keyspace
//! with `SCAN MATCH` so they never block the server the way `KEYS` would.

use super::{CacheStore, CacheStoreStats};
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix for all cache entries
    pub key_prefix: String,

    /// Keys requested per SCAN round trip
    pub scan_count: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "pokedex:cache:".to_string(),
            scan_count: 1000,
        }
    }
}

/// Redis cache implementation
pub struct RedisCache {
    config: RedisCacheConfig,

    /// Reconnects on its own after connection loss; cheap to clone per call
    connection: ConnectionManager,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn new(config: RedisCacheConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        info!("Redis cache connected to {}", config.url);

        Ok(Self {
            config,
            connection,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// SCAN pattern for keys whose logical part contains `pattern`
    fn match_pattern(&self, pattern: &str) -> String {
        format!(
            "{}*{}*",
            escape_glob(&self.config.key_prefix),
            escape_glob(pattern)
        )
    }

    async fn scan_keys(&self, match_pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(match_pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let mut deleted = 0usize;
        for chunk in keys.chunks(500) {
            let count: usize = conn.del(chunk).await?;
            deleted += count;
        }
        Ok(deleted)
    }
}

/// Escape Redis glob metacharacters so a substring is matched literally
fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Redis cache hit for key: {}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Redis cache miss for key: {}", key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let ttl_seconds = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl_seconds)
            .await?;

        debug!("Set Redis cache key: {} with TTL: {:?}", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let deleted: usize = conn.del(self.full_key(key)).await?;
        Ok(deleted > 0)
    }

    async fn delete_matching(&self, pattern: &str) -> CacheResult<usize> {
        let keys = self.scan_keys(&self.match_pattern(pattern)).await?;
        let deleted = self.delete_keys(&keys).await?;
        info!(pattern = %pattern, deleted, "Deleted matching Redis cache keys");
        Ok(deleted)
    }

    async fn count_matching(&self, pattern: &str) -> CacheResult<usize> {
        Ok(self.scan_keys(&self.match_pattern(pattern)).await?.len())
    }

    async fn clear(&self) -> CacheResult<()> {
        let keys = self.scan_keys(&format!("{}*", escape_glob(&self.config.key_prefix))).await?;
        let deleted = self.delete_keys(&keys).await?;
        info!("Cleared {} keys from Redis cache", deleted);
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        let entries = self
            .scan_keys(&format!("{}*", escape_glob(&self.config.key_prefix)))
            .await?
            .len();

        Ok(CacheStoreStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            // Redis handles eviction and TTL cleanup internally
            evictions: 0,
            expired_cleanups: 0,
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Redis)?;
        Ok(response == "PONG")
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("pokemon_list"), "pokemon_list");
        assert_eq!(escape_glob("a*b?[c]"), "a\\*b\\?\\[c\\]");
    }

    async fn setup_redis_cache() -> RedisCache {
        let url = std::env::var("POKEDEX_TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let config = RedisCacheConfig {
            url,
            key_prefix: format!("pokedex:test:{}:", uuid::Uuid::new_v4()),
            ..Default::default()
        };
        RedisCache::new(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis server
    async fn test_basic_operations() {
        let cache = setup_redis_cache().await;

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
    #[ignore] // Requires a running Redis server
    async fn test_pattern_operations() {
        let cache = setup_redis_cache().await;
        let ttl = Duration::from_secs(60);

        cache.set("pokemon_list_20_0", b"a", ttl).await.unwrap();
        cache.set("pokemon_details_abc", b"b", ttl).await.unwrap();

        assert_eq!(cache.count_matching("pokemon").await.unwrap(), 2);
        assert_eq!(cache.delete_matching("details").await.unwrap(), 1);
        assert_eq!(cache.count_matching("pokemon").await.unwrap(), 1);

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }
}

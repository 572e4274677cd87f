//! # Caching System Module
//!
//! Server-side read-through cache for PokeAPI payloads.
//!
//! ## Architecture
//! 1. **Cache Stores**: the `CacheStore` trait with in-memory (DashMap) and Redis backends
//! 2. **Cache Manager**: `get_or_compute` with per-key single-flight, pattern
//!    invalidation and statistics on top of whichever store is configured
//! 3. **Key Generator**: deterministic fingerprints for upstream requests
//! 4. **Admin Interface**: stats, clear and warm endpoints for operators
//!
//! ## Usage Example
//! ```rust,ignore
//! use std::time::Duration;
//! use pokedex_gateway::caching::{CacheConfig, CacheManager};
//!
//! let cache = CacheManager::new(CacheConfig::default()).await?;
//! let value: u32 = cache
//!     .get_or_compute("pokemon_answer", Duration::from_secs(60), || async {
//!         Ok::<_, pokedex_gateway::PokedexError>(42)
//!     })
//!     .await?;
//! ```

pub mod admin;
pub mod cache_manager;
pub mod key_generator;
pub mod stores;

pub use admin::{CacheAdminRouter, CacheAdminState};
pub use cache_manager::{CacheBackend, CacheConfig, CacheManager, CacheStats};
pub use key_generator::CacheKeys;
pub use stores::{CacheEntry, CacheStore, CacheStoreStats, InMemoryCache, RedisCache};

use crate::core::error::PokedexError;

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },
}

impl From<CacheError> for PokedexError {
    fn from(err: CacheError) -> Self {
        PokedexError::Cache {
            message: err.to_string(),
        }
    }
}

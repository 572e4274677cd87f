//! # Cache Key Generator
//!
//! Fingerprints for upstream requests. Every key starts with the cache
//! namespace, so a namespace-wide invalidation catches all of them.

use sha2::{Digest, Sha256};

/// Builds cache keys for PokeAPI operations
#[derive(Debug, Clone)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Key for an index page: `{ns}_list_{limit}_{offset}`
    pub fn index(&self, limit: u32, offset: u64) -> String {
        format!("{}_list_{}_{}", self.namespace, limit, offset)
    }

    /// Key for a detail record, hashing the URL to keep keys short and safe
    pub fn detail(&self, url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        format!("{}_details_{}", self.namespace, hex::encode(digest))
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new("pokemon")
    }
}

//! # PokeAPI Client
//!
//! reqwest-based client for the two PokeAPI operations the gateway needs. Both
//! are read-through cached in the `CacheManager`, so a cached index page or
//! detail record is served without touching the network.

use super::{IndexEntry, PokemonIndex, PokemonSource};
use crate::caching::{CacheKeys, CacheManager, CacheStats};
use crate::core::config::UpstreamConfig;
use crate::core::error::{PokedexError, PokedexResult};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

/// HTTP client for PokeAPI with a read-through cache in front of it
pub struct PokeApiClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<CacheManager>,
    keys: CacheKeys,
}

impl PokeApiClient {
    pub fn new(config: &UpstreamConfig, cache: Arc<CacheManager>) -> PokedexResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| PokedexError::config(format!("Failed to create HTTP client: {}", e)))?;

        let keys = CacheKeys::new(cache.config().namespace.clone());

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
            keys,
        })
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Drop cached upstream payloads whose key contains `pattern`, or all of them
    pub async fn clear_cache(&self, pattern: Option<&str>) -> bool {
        self.cache.invalidate(pattern).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn request_index(&self, limit: u32, offset: u64) -> PokedexResult<PokemonIndex> {
        let url = format!("{}/pokemon", self.base_url);
        let body = self
            .get_json(&url, &[("limit", limit.to_string()), ("offset", offset.to_string())])
            .await
            .map_err(|e| {
                metrics::record_upstream_request("index", "error");
                error!(url = %url, limit, offset, error = %e, "PokeAPI request failed");
                e
            })?;

        let index = parse_index(body)?;
        metrics::record_upstream_request("index", "ok");
        info!(limit, offset, count = index.results.len(), "Fetched Pokemon list");
        Ok(index)
    }

    async fn request_detail(&self, url: &str) -> PokedexResult<Value> {
        let body = self.get_json(url, &[]).await.map_err(|e| {
            metrics::record_upstream_request("detail", "error");
            error!(url = %url, error = %e, "Pokemon details request failed");
            e
        })?;

        match body.get("name") {
            Some(Value::String(name)) => {
                debug!(name = %name, url = %url, "Fetched Pokemon details");
            }
            _ => {
                metrics::record_upstream_request("detail", "malformed");
                return Err(PokedexError::malformed(format!(
                    "detail record at {} has no name",
                    url
                )));
            }
        }

        metrics::record_upstream_request("detail", "ok");
        Ok(body)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> PokedexResult<Value> {
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PokedexError::upstream(
                Some(status.as_u16()),
                format!("GET {} returned {}", url, status),
            ));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| PokedexError::malformed(format!("response from {} is not JSON: {}", url, e)))
    }
}

/// Validate an index payload; `results` and `count` are both required
fn parse_index(body: Value) -> PokedexResult<PokemonIndex> {
    let count = body
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| PokedexError::malformed("index response has no count"))?;

    let results = body
        .get("results")
        .cloned()
        .ok_or_else(|| PokedexError::malformed("index response has no results"))?;

    let results: Vec<IndexEntry> = serde_json::from_value(results)
        .map_err(|e| PokedexError::malformed(format!("index results are malformed: {}", e)))?;

    Ok(PokemonIndex { results, count })
}

#[async_trait]
impl PokemonSource for PokeApiClient {
    async fn fetch_index(&self, limit: u32, offset: u64) -> PokedexResult<PokemonIndex> {
        let key = self.keys.index(limit, offset);
        self.cache
            .get_or_compute(&key, self.cache.default_ttl(), || {
                self.request_index(limit, offset)
            })
            .await
    }

    async fn fetch_detail(&self, url: &str) -> PokedexResult<Value> {
        let key = self.keys.detail(url);
        self.cache
            .get_or_compute(&key, self.cache.default_ttl(), || self.request_detail(url))
            .await
    }
}

//! # Configuration Module
//!
//! Configuration for the gateway process: HTTP binding, the PokeAPI upstream,
//! the cache layer, list aggregation limits and logging.
//!
//! ## Key Features
//! - YAML configuration parsing with serde, every section optional
//! - Human-readable durations (`"24h"`, `"10s"`) through `humantime-serde`
//! - Environment variable overrides with the `POKEDEX_` prefix
//! - Validation with all problems reported at once

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::caching::CacheConfig;
use crate::core::error::{PokedexError, PokedexResult};
use crate::observability::logging::{LogConfig, LogFormat};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PokedexConfig {
    /// Public and admin HTTP servers
    pub server: ServerConfig,

    /// PokeAPI connection settings
    pub upstream: UpstreamConfig,

    /// Server-side cache settings
    pub cache: CacheConfig,

    /// List aggregation limits
    pub aggregator: AggregatorConfig,

    /// Logging settings
    pub logging: LogConfig,
}

impl PokedexConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> PokedexResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            PokedexError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config: PokedexConfig = serde_yaml::from_str(&content)
            .map_err(|e| PokedexError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults
    pub async fn load(path: Option<&Path>) -> PokedexResult<Self> {
        match path {
            Some(path) => Self::load_from_file(path).await,
            None => {
                let mut config = Self::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern `POKEDEX_<SECTION>_<FIELD>`,
    /// for example `POKEDEX_UPSTREAM_BASE_URL=http://localhost:9000/api/v2`.
    pub fn apply_env_overrides(&mut self) -> PokedexResult<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup function
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> PokedexResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("POKEDEX_SERVER_BIND_ADDRESS") {
            self.server.bind_addr = addr.parse().map_err(|e| {
                PokedexError::config(format!("Invalid POKEDEX_SERVER_BIND_ADDRESS: {}", e))
            })?;
        }

        if let Some(addr) = lookup("POKEDEX_ADMIN_BIND_ADDRESS") {
            self.server.admin_bind_addr = addr.parse().map_err(|e| {
                PokedexError::config(format!("Invalid POKEDEX_ADMIN_BIND_ADDRESS: {}", e))
            })?;
        }

        if let Some(base_url) = lookup("POKEDEX_UPSTREAM_BASE_URL") {
            self.upstream.base_url = base_url;
        }

        if let Some(ttl) = lookup("POKEDEX_CACHE_TTL") {
            self.cache.ttl = humantime::parse_duration(&ttl)
                .map_err(|e| PokedexError::config(format!("Invalid POKEDEX_CACHE_TTL: {}", e)))?;
        }

        if let Some(backend) = lookup("POKEDEX_CACHE_BACKEND") {
            self.cache.backend = backend.parse()?;
        }

        if let Some(url) = lookup("POKEDEX_REDIS_URL") {
            self.cache.redis.url = url;
        }

        if let Some(level) = lookup("POKEDEX_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("POKEDEX_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => {
                    return Err(PokedexError::config(format!(
                        "Invalid POKEDEX_LOG_FORMAT: {}",
                        other
                    )))
                }
            };
        }

        Ok(())
    }

    /// Validate the configuration, reporting every problem found
    pub fn validate(&self) -> PokedexResult<()> {
        let mut errors = Vec::new();

        if self.server.bind_addr == self.server.admin_bind_addr && self.server.bind_addr.port() != 0 {
            errors.push("bind_addr and admin_bind_addr must differ".to_string());
        }

        match Url::parse(&self.upstream.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(format!(
                "upstream base_url must be http(s), got scheme '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("upstream base_url is not a valid URL: {}", e)),
        }

        if self.upstream.connect_timeout.is_zero() {
            errors.push("upstream connect_timeout must be greater than 0".to_string());
        }

        if self.upstream.request_timeout < self.upstream.connect_timeout {
            errors.push("upstream request_timeout must not be shorter than connect_timeout".to_string());
        }

        if self.cache.ttl.is_zero() {
            errors.push("cache ttl must be greater than 0".to_string());
        }

        if self.cache.namespace.is_empty() {
            errors.push("cache namespace cannot be empty".to_string());
        }

        let agg = &self.aggregator;
        if agg.max_limit == 0 || agg.max_limit > 100 {
            errors.push(format!("aggregator max_limit must be within 1..=100, got {}", agg.max_limit));
        }
        if agg.default_limit == 0 || agg.default_limit > agg.max_limit {
            errors.push(format!(
                "aggregator default_limit must be within 1..={}, got {}",
                agg.max_limit, agg.default_limit
            ));
        }
        if agg.search_pool_size == 0 {
            errors.push("aggregator search_pool_size must be greater than 0".to_string());
        }
        if agg.detail_concurrency == 0 {
            errors.push("aggregator detail_concurrency must be greater than 0".to_string());
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        if !errors.is_empty() {
            return Err(PokedexError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public API bind address
    pub bind_addr: SocketAddr,

    /// Cache administration bind address
    pub admin_bind_addr: SocketAddr,

    /// Name reported by the health endpoint
    pub service_name: String,

    /// Allow cross-origin requests from browsers
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            admin_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            service_name: "Pokedex API".to_string(),
            cors_enabled: true,
        }
    }
}

/// PokeAPI upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// TCP connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Total request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent upstream
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pokeapi.co/api/v2".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: "Pokedex-App/1.0".to_string(),
        }
    }
}

/// List aggregation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Page size when the request has none
    pub default_limit: u32,

    /// Largest accepted page size
    pub max_limit: u32,

    /// Number of index entries scanned by a search (starting at offset 0)
    pub search_pool_size: u32,

    /// Maximum detail fetches in flight for one page
    pub detail_concurrency: usize,

    /// Longest accepted search term
    pub max_search_length: usize,

    /// Pause between pages while warming the cache
    #[serde(with = "humantime_serde")]
    pub warm_page_delay: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            search_pool_size: 200,
            detail_concurrency: 10,
            max_search_length: 255,
            warm_page_delay: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::CacheBackend;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = PokedexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.base_url, "https://pokeapi.co/api/v2");
        assert_eq!(config.cache.ttl, Duration::from_secs(86400));
        assert_eq!(config.aggregator.search_pool_size, 200);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("POKEDEX_UPSTREAM_BASE_URL", "http://localhost:9999/api/v2"),
            ("POKEDEX_CACHE_TTL", "1h"),
            ("POKEDEX_CACHE_BACKEND", "redis"),
            ("POKEDEX_REDIS_URL", "redis://cache:6379"),
            ("POKEDEX_LOG_FORMAT", "text"),
        ]
        .into_iter()
        .collect();

        let mut config = PokedexConfig::default();
        config
            .apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.upstream.base_url, "http://localhost:9999/api/v2");
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.cache.redis.url, "redis://cache:6379");
        assert!(matches!(config.logging.format, LogFormat::Text));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = PokedexConfig::default();
        let result = config.apply_overrides_from(|name| {
            (name == "POKEDEX_CACHE_TTL").then(|| "forever".to_string())
        });
        assert!(matches!(result, Err(PokedexError::Configuration { .. })));
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config = PokedexConfig::default();
        config.upstream.base_url = "ftp://example.com".to_string();
        config.aggregator.max_limit = 500;
        config.logging.level = "loud".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http(s)"));
        assert!(err.contains("max_limit"));
        assert!(err.contains("Invalid log level"));
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
upstream:
  base_url: "http://pokeapi.local/api/v2"
  request_timeout: 5s
cache:
  ttl: 10m
"#;
        let config: PokedexConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.upstream.base_url, "http://pokeapi.local/api/v2");
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(5));
        assert_eq!(config.upstream.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.aggregator.default_limit, 20);
    }
}

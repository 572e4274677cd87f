//! # Cache Admin Interface
//!
//! Operator endpoints for the PokeAPI cache, served on the admin bind address:
//!
//! - `GET /cache/stats` - item count, TTL, backend and hit/miss counters
//! - `POST /cache/clear` - drop entries matching `pattern`, or the whole namespace
//! - `POST /cache/warm` - pre-load the first `pages` list pages

use crate::pokemon::{PokemonService, WarmReport};
use crate::upstream::PokeApiClient;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::CacheStats;

/// Cache admin state
#[derive(Clone)]
pub struct CacheAdminState {
    pub client: Arc<PokeApiClient>,
    pub service: Arc<PokemonService>,
}

/// Cache admin router
pub struct CacheAdminRouter;

impl CacheAdminRouter {
    pub fn create_router(state: CacheAdminState) -> Router {
        Router::new()
            .route("/cache/stats", get(get_cache_stats))
            .route("/cache/clear", post(clear_cache))
            .route("/cache/warm", post(warm_cache))
            .with_state(state)
    }
}

/// Cache statistics response
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub stats: CacheStats,
    pub healthy: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Cache clear request; no pattern clears every Pokémon entry
#[derive(Debug, Default, Deserialize)]
pub struct CacheClearRequest {
    pub pattern: Option<String>,
}

/// Cache clear response
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Cache warm request
#[derive(Debug, Deserialize)]
pub struct CacheWarmRequest {
    #[serde(default = "default_warm_pages")]
    pub pages: u32,
    pub limit: Option<u32>,
}

impl Default for CacheWarmRequest {
    fn default() -> Self {
        Self {
            pages: default_warm_pages(),
            limit: None,
        }
    }
}

fn default_warm_pages() -> u32 {
    5
}

/// Cache warm response
#[derive(Debug, Serialize)]
pub struct CacheWarmResponse {
    pub success: bool,
    pub report: WarmReport,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Get cache statistics
pub async fn get_cache_stats(State(state): State<CacheAdminState>) -> Json<CacheStatsResponse> {
    let stats = state.client.cache_stats().await;
    let healthy = state.client.cache().health_check().await;

    info!(
        entries = stats.total_cached_items,
        driver = %stats.cache_driver,
        "Cache stats requested"
    );

    Json(CacheStatsResponse {
        stats,
        healthy,
        timestamp: chrono::Utc::now(),
    })
}

/// Clear cache entries
pub async fn clear_cache(
    State(state): State<CacheAdminState>,
    body: Option<Json<CacheClearRequest>>,
) -> Json<CacheClearResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let pattern = request.pattern.as_deref().filter(|p| !p.is_empty());

    let success = state.client.clear_cache(pattern).await;
    let message = match (success, pattern) {
        (true, Some(p)) => format!("Cleared cache entries matching '{}'", p),
        (true, None) => "Cleared all Pokemon cache entries".to_string(),
        (false, _) => "Failed to clear cache".to_string(),
    };

    if success {
        info!(pattern = ?pattern, "Cache cleared via admin API");
    } else {
        warn!(pattern = ?pattern, "Failed to clear cache via admin API");
    }

    Json(CacheClearResponse {
        success,
        message,
        timestamp: chrono::Utc::now(),
    })
}

/// Warm the cache with the first pages of the list
pub async fn warm_cache(
    State(state): State<CacheAdminState>,
    body: Option<Json<CacheWarmRequest>>,
) -> Json<CacheWarmResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let config = state.service.config();
    let limit = request
        .limit
        .unwrap_or(config.default_limit)
        .min(config.max_limit)
        .max(1);

    let report = state.service.warm_cache(request.pages, limit).await;

    Json(CacheWarmResponse {
        success: report.failures == 0,
        report,
        timestamp: chrono::Utc::now(),
    })
}

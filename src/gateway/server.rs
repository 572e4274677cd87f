//! # HTTP Server Module
//!
//! The public API and the cache admin API, served by axum on two listeners.
//!
//! ## Public routes
//!
//! - `GET /api/pokemons?page&limit&search` - one page of formatted Pokémon
//! - `GET /api/health` - liveness probe
//!
//! Query parameters arrive as raw strings and are validated here, so a bad
//! `page=abc` yields the 400 envelope with a per-field message instead of the
//! extractor's plain-text rejection.

use crate::caching::{CacheAdminRouter, CacheAdminState};
use crate::core::config::{AggregatorConfig, ServerConfig};
use crate::core::error::{FieldErrors, PokedexError, PokedexResult};
use crate::core::types::ListResponse;
use crate::pokemon::PokemonService;
use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Message returned with a successful list
pub const LIST_SUCCESS_MESSAGE: &str = "Pokemon list retrieved successfully";

/// Shared state for public handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PokemonService>,
    pub service_name: Arc<str>,
}

/// Raw list query; every field is validated by hand
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

/// Validated list parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
}

impl ListQuery {
    /// Validate against the aggregator limits, collecting every field error
    pub fn validate(self, limits: &AggregatorConfig) -> PokedexResult<ListParams> {
        let mut errors = FieldErrors::new();

        let page = parse_bounded(&mut errors, "page", self.page.as_deref(), 1, None)
            .unwrap_or(1);
        let limit = parse_bounded(
            &mut errors,
            "limit",
            self.limit.as_deref(),
            1,
            Some(i64::from(limits.max_limit)),
        )
        .unwrap_or(i64::from(limits.default_limit));

        let search = self.search.filter(|s| !s.is_empty());
        if let Some(term) = &search {
            if term.chars().count() > limits.max_search_length {
                errors.entry("search".to_string()).or_default().push(format!(
                    "The search field must not be greater than {} characters.",
                    limits.max_search_length
                ));
            }
        }

        if !errors.is_empty() {
            return Err(PokedexError::Validation { errors });
        }

        // Both are range-checked above
        Ok(ListParams {
            page: u32::try_from(page).unwrap_or(u32::MAX),
            limit: u32::try_from(limit).unwrap_or(limits.default_limit),
            search,
        })
    }
}

/// Parse an optional integer field; empty means absent
fn parse_bounded(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    min: i64,
    max: Option<i64>,
) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

    let value = match raw.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            errors
                .entry(field.to_string())
                .or_default()
                .push(format!("The {} field must be an integer.", field));
            return None;
        }
    };

    if value < min {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("The {} field must be at least {}.", field, min));
        return None;
    }

    if let Some(max) = max {
        if value > max {
            errors
                .entry(field.to_string())
                .or_default()
                .push(format!("The {} field must not be greater than {}.", field, max));
            return None;
        }
    }

    if value > i64::from(u32::MAX) {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("The {} field is too large.", field));
        return None;
    }

    Some(value)
}

/// `GET /api/pokemons`
pub async fn list_pokemons(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListResponse>, PokedexError> {
    let Query(query) = query.map_err(|rejection| {
        let error = query_rejection_error(&rejection);
        warn!(rejection = %rejection.body_text(), "Pokemon API query rejected");
        error
    })?;

    let params = query.validate(state.service.config()).map_err(|e| {
        if let PokedexError::Validation { errors } = &e {
            warn!(errors = ?errors, "Pokemon API validation error");
        }
        e
    })?;

    info!(page = params.page, limit = params.limit, search = ?params.search, "Pokemon API request");

    let outcome = state
        .service
        .list(params.page, params.limit, params.search.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, error_type = e.error_type(), "Pokemon API error");
            e
        })?;

    if !outcome.skipped.is_empty() {
        warn!(
            skipped = outcome.skipped.len(),
            page = params.page,
            "Some Pokemon were left out of the page"
        );
    }

    Ok(Json(ListResponse::from_result(
        outcome.into_result(),
        LIST_SUCCESS_MESSAGE,
    )))
}

/// Validation error for a query string the extractor could not decode,
/// attributed to the field it names when there is one
fn query_rejection_error(rejection: &QueryRejection) -> PokedexError {
    let detail = rejection.body_text();
    let field = ["page", "limit", "search"]
        .into_iter()
        .find(|field| detail.contains(&format!("`{}`", field)));

    match field {
        Some(field) => PokedexError::validation(
            field,
            format!("The {} field must be a single value.", field),
        ),
        None => PokedexError::validation("query", "The query string is malformed."),
    }
}

/// `GET /api/health`
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "service": &*state.service_name,
    }))
}

/// Response-time and security headers on every public response
async fn response_headers_middleware(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}ms", elapsed_ms)) {
        headers.insert(HeaderName::from_static("x-response-time"), value);
    }
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );

    response
}

/// Build the public router, mounted under `/api`
pub fn create_app(service: Arc<PokemonService>, config: &ServerConfig) -> Router {
    let state = AppState {
        service,
        service_name: Arc::from(config.service_name.as_str()),
    };

    let api = Router::new()
        .route("/pokemons", get(list_pokemons))
        .route("/health", get(health_check))
        .with_state(state);

    let mut app = Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(response_headers_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        );

    if config.cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Public and admin HTTP servers
pub struct PokedexServer {
    bind_addr: SocketAddr,
    admin_bind_addr: SocketAddr,
    app: Router,
    admin_app: Router,
}

impl PokedexServer {
    pub fn new(config: &ServerConfig, admin_state: CacheAdminState) -> Self {
        let app = create_app(admin_state.service.clone(), config);
        let admin_app = CacheAdminRouter::create_router(admin_state)
            .layer(TraceLayer::new_for_http());

        Self {
            bind_addr: config.bind_addr,
            admin_bind_addr: config.admin_bind_addr,
            app,
            admin_app,
        }
    }

    /// Serve both routers until `shutdown` is cancelled
    pub async fn start(self, shutdown: CancellationToken) -> PokedexResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            PokedexError::internal(format!("Failed to bind API server to {}: {}", self.bind_addr, e))
        })?;

        let admin_listener = TcpListener::bind(self.admin_bind_addr).await.map_err(|e| {
            PokedexError::internal(format!(
                "Failed to bind admin server to {}: {}",
                self.admin_bind_addr, e
            ))
        })?;

        info!("Pokedex API listening on {}", self.bind_addr);
        info!("Cache admin API listening on {}", self.admin_bind_addr);

        let api_shutdown = shutdown.clone();
        let api_server = axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { api_shutdown.cancelled().await });

        let admin_shutdown = shutdown.clone();
        let admin_server = axum::serve(admin_listener, self.admin_app)
            .with_graceful_shutdown(async move { admin_shutdown.cancelled().await });

        let result = tokio::try_join!(
            async {
                api_server
                    .await
                    .map_err(|e| PokedexError::internal(format!("API server error: {}", e)))
            },
            async {
                admin_server
                    .await
                    .map_err(|e| PokedexError::internal(format!("Admin server error: {}", e)))
            },
        );

        // One server failing takes the other down with it
        shutdown.cancel();
        result.map(|_| ())
    }
}

//! # API Client
//!
//! HTTP client for this service's own `/pokemons` endpoint, used by the
//! request cache. Every failure becomes an `ApiError` that says whether it was
//! a timeout, a network failure or an HTTP status.

use super::fingerprint::ListRequest;
use crate::core::types::ListResponse;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default client-side request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default base URL of the Pokedex API
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Non-2xx response
    Http,
    /// Connection could not be made or was dropped
    Network,
    /// No response within the timeout
    Timeout,
    /// Response body was not the expected JSON
    Decode,
    /// Client-side failure unrelated to the request
    Internal,
}

/// Error returned to request-cache callers
///
/// `Clone` because one in-flight fetch can resolve many callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub kind: ApiErrorKind,
    pub status: Option<u16>,
}

impl ApiError {
    /// Error for a non-success HTTP status
    pub fn from_status(status: StatusCode) -> Self {
        let message = match status.as_u16() {
            400 => "Invalid request parameters".to_string(),
            404 => "Pokemon data not found".to_string(),
            429 => "Too many requests - please wait a moment".to_string(),
            500 => "Server error - please try again later".to_string(),
            503 => "Pokemon service is temporarily unavailable".to_string(),
            code => format!(
                "API Error: {} {}",
                code,
                status.canonical_reason().unwrap_or_default()
            )
            .trim_end()
            .to_string(),
        };

        Self {
            message,
            kind: ApiErrorKind::Http,
            status: Some(status.as_u16()),
        }
    }

    pub fn timeout() -> Self {
        Self {
            message: "Request timeout".to_string(),
            kind: ApiErrorKind::Timeout,
            status: None,
        }
    }

    pub fn network() -> Self {
        Self {
            message: "Network error - please check your internet connection".to_string(),
            kind: ApiErrorKind::Network,
            status: None,
        }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            kind: ApiErrorKind::Decode,
            status: None,
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            kind: ApiErrorKind::Internal,
            status: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_network_error(&self) -> bool {
        self.kind == ApiErrorKind::Network
    }

    pub fn is_timeout_error(&self) -> bool {
        self.kind == ApiErrorKind::Timeout
    }

    /// Client errors (4xx) are never retried; everything else may be
    pub fn is_retryable(&self) -> bool {
        !matches!(self.status, Some(400..=499))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout()
        } else if err.is_decode() {
            Self::decode(format!("Invalid response body: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            Self::network()
        }
    }
}

/// Anything that can produce a list page for the request cache
#[async_trait]
pub trait ListFetcher: Send + Sync + 'static {
    async fn fetch_list(&self, request: &ListRequest) -> Result<ListResponse, ApiError>;
}

/// HTTP client for `GET {base}/pokemons`
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_pokemon_list(&self, request: &ListRequest) -> Result<ListResponse, ApiError> {
        let url = format!("{}/pokemons", self.base_url);
        let query = request.query_pairs();
        debug!(url = %url, query = ?query, "Requesting Pokemon list");

        let response = self.http.get(&url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status));
        }

        Ok(response.json::<ListResponse>().await?)
    }
}

#[async_trait]
impl ListFetcher for ApiClient {
    async fn fetch_list(&self, request: &ListRequest) -> Result<ListResponse, ApiError> {
        self.get_pokemon_list(request).await
    }
}

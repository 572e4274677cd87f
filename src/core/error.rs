//! # Error Handling Module
//!
//! This module defines every error the gateway can surface, using the `thiserror` crate,
//! and maps each one onto the HTTP envelope that clients of `/api/pokemons` receive.
//!
//! ## Error Taxonomy
//!
//! - `Validation` - bad input shape (page < 1, limit outside 1..=100). Rendered as 400
//!   together with the per-field messages.
//! - `UpstreamUnavailable` - network failure, timeout or non-2xx status from PokeAPI.
//!   Rendered as 503 and safe for clients to retry with backoff.
//! - `MalformedUpstreamResponse` / `MissingRequiredField` - PokeAPI broke its contract.
//!   Rendered as a generic 500, the details only go to the logs.
//! - `Configuration`, `Cache`, `Internal` - everything else, also a generic 500.
//!
//! Per-entry detail failures during list aggregation never reach this type as a
//! terminal error: the aggregator records them as skipped entries instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type PokedexResult<T> = Result<T, PokedexError>;

/// Per-field validation messages, keyed by query parameter name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message returned to clients when PokeAPI cannot be reached
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "External service temporarily unavailable. Please try again later.";

/// Message returned to clients for any internal failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// Message returned to clients when query validation fails
pub const VALIDATION_ERROR_MESSAGE: &str = "Invalid request parameters";

/// Error types for the Pokedex gateway
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display`. Those
/// messages are meant for logs; the client-facing text comes from `client_message`.
#[derive(Debug, Error, Clone)]
pub enum PokedexError {
    /// Request parameters failed validation
    #[error("Request validation failed: {errors:?}")]
    Validation { errors: FieldErrors },

    /// PokeAPI is unreachable, timed out, or answered with a non-success status
    #[error("PokeAPI request failed{}: {message}", status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    UpstreamUnavailable { status: Option<u16>, message: String },

    /// PokeAPI answered, but the payload is missing keys we rely on
    #[error("Invalid response format from PokeAPI: {message}")]
    MalformedUpstreamResponse { message: String },

    /// A raw detail record lacks a field the output contract requires
    #[error("Required field '{field}' is missing from the Pokemon record")]
    MissingRequiredField { field: String },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Cache backend failure that could not be absorbed
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Anything unexpected
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl PokedexError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an upstream-unavailable error
    pub fn upstream<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::UpstreamUnavailable {
            status,
            message: message.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedUpstreamResponse {
            message: message.into(),
        }
    }

    /// Create a missing-field error
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    /// Create a validation error for a single field
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::Validation { errors }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedUpstreamResponse { .. }
            | Self::MissingRequiredField { .. }
            | Self::Configuration { .. }
            | Self::Cache { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if a client may retry the request that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    /// Get a string representation of the error type for logs
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            Self::MissingRequiredField { .. } => "missing_required_field",
            Self::Configuration { .. } => "configuration_error",
            Self::Cache { .. } => "cache_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// The message shown to API clients. Internal details never leak here.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Validation { .. } => VALIDATION_ERROR_MESSAGE,
            Self::UpstreamUnavailable { .. } => UPSTREAM_UNAVAILABLE_MESSAGE,
            _ => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl From<std::io::Error> for PokedexError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for PokedexError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Transport-level failures from reqwest all count as the upstream being unavailable
impl From<reqwest::Error> for PokedexError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = if err.is_timeout() {
            format!("timeout: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        Self::UpstreamUnavailable { status, message }
    }
}

/// Render errors as the `{ success: false, message, errors? }` envelope
impl IntoResponse for PokedexError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Self::Validation { errors } => json!({
                "success": false,
                "message": self.client_message(),
                "errors": errors,
            }),
            _ => json!({
                "success": false,
                "message": self.client_message(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

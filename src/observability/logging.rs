//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` seeded from the
//! configured level (overridable through `RUST_LOG`) and a JSON or text
//! formatting layer.

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::error::{PokedexError, PokedexResult};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level: trace, debug, info, warn or error
    pub level: String,

    /// Output format
    pub format: LogFormat,

    /// Include the event target (module path) in each line
    pub with_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            with_target: true,
        }
    }
}

/// Parse a configured level name
pub fn parse_level(level: &str) -> PokedexResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(PokedexError::config(format!("Invalid log level: {}", other))),
    }
}

/// Initialize the global tracing subscriber
///
/// Calling this twice is harmless: the second attempt logs a warning and keeps
/// the subscriber that is already installed.
pub fn init_logging(config: &LogConfig, service_name: &str) -> PokedexResult<()> {
    let level = parse_level(&config.level)?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(config.with_target),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(config.with_target))
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }

    info!(service = %service_name, level = %level, "Structured logging initialized");
    Ok(())
}

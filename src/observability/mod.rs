//! # Observability
//!
//! Structured logging setup and metric counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat};

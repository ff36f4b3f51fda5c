//! # WC Telemetry
//!
//! Structured logging for the auth client.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wc_telemetry::{init_logging, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `wc-auth` | Service name on log lines |
//! | `WC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directive |
//! | `WC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `WC_JSON_LOGS` | `false` | JSON log format |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

//! Structured logging.
//!
//! Log lines carry consistent fields so they can be filtered per client and
//! per topic:
//! - `subsystem`: Component tag (relayer, pairing, auth, ...)
//! - `topic`: Pairing topic, when the event concerns one
//! - `id`: JSON-RPC id, when the event concerns one

use crate::{TelemetryConfig, TelemetryError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global `tracing` subscriber.
///
/// Only the first call has an effect; later calls return `Ok(())`.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    let fmt_layer = if !config.console_output {
        None
    } else if config.json_logs {
        // JSON output for containers/production
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        )
    } else {
        // Pretty output for development
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(true)
                .boxed(),
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );
    Ok(())
}

/// Helper to create structured log entries with consistent formatting.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a topic-scoped event with standard fields.
#[macro_export]
macro_rules! log_topic_event {
    ($level:ident, $subsystem:expr, $msg:expr, $topic:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            topic = %$topic,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        };
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_macros_expand() {
        let topic = "abcd";
        crate::log_event!(info, "relayer", "connected", attempts = 1);
        crate::log_event!(debug, "relayer", "no fields");
        crate::log_topic_event!(warn, "pairing", "expired", topic, active = false);
    }
}

//! # Relayer Errors

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayerError {
    /// No live relay connection and the policy does not allow queueing.
    #[error("relay not connected")]
    NotConnected,

    /// The relay did not acknowledge within the configured bound.
    #[error("relay operation timed out after {0}ms")]
    Timeout(u64),

    /// Transport-level failure reported by the adapter.
    #[error("transport error: {0}")]
    Transport(String),

    /// The relay rejected a request.
    #[error("relay rejected request: {code} {message}")]
    Rejected { code: i64, message: String },

    #[error("not subscribed to topic {0}")]
    NotSubscribed(String),
}

impl RelayerError {
    /// Whether a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Timeout(_) | Self::Transport(_)
        )
    }
}

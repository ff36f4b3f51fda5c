use thiserror::Error;

/// Failures of an attestation lookup. Never surfaced past the resolver;
/// each one collapses to `Validation::Unknown`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("attestation lookup failed: {0}")]
    Unreachable(String),

    #[error("attestation lookup timed out")]
    Timeout,

    #[error("malformed attestation: {0}")]
    Malformed(String),
}

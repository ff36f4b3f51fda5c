//! # Expirer Errors

use shared_types::KVStoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpirerError {
    /// Target string is neither `topic:{hex}` nor `id:{u64}`.
    #[error("Invalid expiry target: {0}")]
    InvalidTarget(String),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),
}

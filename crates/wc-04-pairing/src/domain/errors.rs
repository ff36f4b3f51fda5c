//! # Pairing Errors

use shared_crypto::CryptoError;
use shared_types::{KVStoreError, Topic};
use thiserror::Error;
use wc_01_expirer::ExpirerError;
use wc_03_relayer::RelayerError;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("invalid pairing uri: {0}")]
    InvalidUri(String),

    #[error("pairing already exists for topic {0}")]
    AlreadyPaired(Topic),

    #[error("no pairing for topic {0}")]
    NotFound(Topic),

    #[error("pairing {topic} did not answer within {timeout_ms}ms")]
    Timeout { topic: Topic, timeout_ms: u64 },

    #[error("operation cancelled")]
    Cancelled,

    /// The peer answered a control request with an error.
    #[error("peer error {code}: {message}")]
    Peer { code: i64, message: String },

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Relayer(#[from] RelayerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Expirer(#[from] ExpirerError),

    #[error(transparent)]
    Storage(#[from] KVStoreError),
}

impl PairingError {
    /// Decryption failures mean "not for us"; callers drop the message.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::DecryptionFailed))
    }
}

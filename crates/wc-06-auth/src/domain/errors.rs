//! # Auth Errors
//!
//! Signature and integrity failures are always surfaced, either as a
//! returned error or as an `AuthEvent::Error`.

use shared_crypto::CryptoError;
use shared_types::{KVStoreError, RpcId};
use thiserror::Error;
use wc_01_expirer::ExpirerError;
use wc_02_history::HistoryError;
use wc_04_pairing::PairingError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// `respond` for an id with no pending inbound request.
    #[error("no pending auth request {0}")]
    RequestNotFound(RpcId),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid issuer '{0}'")]
    InvalidIssuer(String),

    #[error("malformed auth response: {0}")]
    InvalidResponse(String),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("operation cancelled")]
    Cancelled,

    /// The contract signature check could not be performed.
    #[error("contract signature check failed: {0}")]
    SignatureVerifier(String),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Expirer(#[from] ExpirerError),

    #[error(transparent)]
    Storage(#[from] KVStoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

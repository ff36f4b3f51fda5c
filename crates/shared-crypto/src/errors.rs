//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Envelope could not be opened: bad encoding, unknown type, wrong key
    /// or tampered ciphertext.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// Key material is not valid hex
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Recovery id byte is not one of 0, 1, 27, 28
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed
    #[error("Public key recovery failed")]
    RecoveryFailed,

    /// Invalid address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid private key
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

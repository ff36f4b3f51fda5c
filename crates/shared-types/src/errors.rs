//! # Error Types
//!
//! Errors shared by the storage port and identifier parsing.

use thiserror::Error;

/// Errors raised by a [`crate::KeyValueStore`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {message}")]
    IOError { message: String },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error for key {key}: {message}")]
    Serialization { key: String, message: String },

    /// The snapshot file exists but is not a valid store image.
    #[error("Corrupted store file: {0}")]
    Corrupted(String),
}

/// Errors raised when parsing identifiers from untrusted input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Topic is not 64 lowercase hex characters.
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

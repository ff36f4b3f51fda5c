//! # Shared Crypto - Pairing and Signature Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | ChaCha20-Poly1305 | Pairing key, topic derivation, type-0 envelopes |
//! | `hashing` | SHA-256, Keccak-256 | Topic digest, EIP-191 message hash |
//! | `ecdsa` | secp256k1 | Signer address recovery, local test signer |
//!
//! ## Security Properties
//!
//! - **Envelope**: fresh 96-bit random IV per message, authenticated; any
//!   tampering or wrong key yields `DecryptionFailed`, never partial plaintext.
//! - **Topic**: SHA-256 of the key, so the topic reveals nothing about the key.
//! - **secp256k1**: RFC 6979 deterministic, low-S normalized signatures.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod symmetric;

// Re-exports
pub use ecdsa::{format_address, parse_address, recover_address, Address, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use hashing::{eip191_hash, keccak256, sha256, Hash};
pub use symmetric::{decrypt, derive_topic, encrypt, SymKey};

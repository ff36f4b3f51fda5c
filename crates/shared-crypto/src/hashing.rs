//! # Hashing
//!
//! SHA-256 for topic derivation and envelope attestation ids, Keccak-256 for
//! Ethereum personal-message hashing.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// 256-bit digest.
pub type Hash = [u8; 32];

/// SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 personal-message hash:
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`.
pub fn eip191_hash(message: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

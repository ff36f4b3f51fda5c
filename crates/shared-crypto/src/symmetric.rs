//! # Symmetric Encryption
//!
//! Pairing keys, topic derivation and the type-0 envelope.
//!
//! ## Envelope layout
//!
//! ```text
//! base64( type:u8 = 0x00 || iv:[u8; 12] || ChaCha20-Poly1305(key, iv, plaintext) )
//! ```

use crate::hashing::sha256;
use crate::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shared_types::Topic;
use std::fmt;
use zeroize::Zeroize;

/// Envelope type for messages sealed with the shared pairing key.
pub const TYPE_0: u8 = 0;

/// IV length for ChaCha20-Poly1305.
pub const IV_LENGTH: usize = 12;

/// Symmetric key length.
pub const KEY_LENGTH: usize = 32;

/// Poly1305 tag length.
const TAG_LENGTH: usize = 16;

/// Pairing symmetric key (256-bit).
///
/// `Debug` is redacted. Serializes as lowercase hex, which is only ever
/// written into the owning pairing's storage record and its URI.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SymKey([u8; KEY_LENGTH]);

impl SymKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Generate a random key from the OS-seeded thread RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let mut decoded =
            hex::decode(value).map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        if decoded.len() != KEY_LENGTH {
            let actual = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual,
            });
        }
        let mut bytes = [0u8; KEY_LENGTH];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Topic derived from this key.
    pub fn topic(&self) -> Topic {
        derive_topic(self)
    }
}

impl fmt::Debug for SymKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymKey(..)")
    }
}

impl Serialize for SymKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SymKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SymKey::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Derive the relay topic: `hex(sha256(key))`.
pub fn derive_topic(key: &SymKey) -> Topic {
    Topic::from_digest(&sha256(key.as_bytes()))
}

/// Seal `plaintext` into a base64 type-0 envelope under a fresh random IV.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the AEAD rejects the input.
pub fn encrypt(key: &SymKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let mut iv = [0u8; IV_LENGTH];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut iv);
    seal(key, &iv, plaintext)
}

fn seal(key: &SymKey, iv: &[u8; IV_LENGTH], plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let sealed = cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(1 + IV_LENGTH + sealed.len());
    out.push(TYPE_0);
    out.extend_from_slice(iv);
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
}

/// Open a base64 type-0 envelope.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` on bad base64, unknown envelope
/// type, truncated input, wrong key or tampering.
pub fn decrypt(key: &SymKey, envelope: &str) -> Result<Vec<u8>, CryptoError> {
    let raw = STANDARD
        .decode(envelope)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    if raw.len() < 1 + IV_LENGTH + TAG_LENGTH || raw[0] != TYPE_0 {
        return Err(CryptoError::DecryptionFailed);
    }
    let (iv, sealed) = raw[1..].split_at(IV_LENGTH);

    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), sealed)
        .map_err(|_| CryptoError::DecryptionFailed)
}

//! # ECDSA Signatures (secp256k1)
//!
//! Ethereum-style signer recovery for personal-message (EIP-191) signatures,
//! plus a local keypair that produces such signatures. The keypair stands in
//! for the external signer in tests and demos.
//!
//! ## Signature layout
//!
//! 65 bytes `r || s || v`, `v` in {0, 1, 27, 28}.

use crate::hashing::{eip191_hash, keccak256, Hash};
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// 20-byte Ethereum address.
pub type Address = [u8; 20];

/// Length of a recoverable signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Render an address as `0x`-prefixed lowercase hex.
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// Parse a `0x`-prefixed (or bare) hex address, any case.
pub fn parse_address(value: &str) -> Result<Address, CryptoError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes =
        hex::decode(stripped).map_err(|_| CryptoError::InvalidAddress(value.to_string()))?;
    <[u8; 20]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidAddress(value.to_string()))
}

/// Recover the signer address from a prehashed message and a 65-byte signature.
pub fn recover_address(message_hash: &Hash, signature: &[u8]) -> Result<Address, CryptoError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CryptoError::InvalidSignatureFormat);
    }

    // Parse recovery ID
    let recovery_id = parse_recovery_id(signature[64])?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature[..64]);
    let sig = Signature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = sig.map_err(|_| CryptoError::InvalidSignatureFormat)?;

    let recovered_key = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered_key))
}

/// Derive Ethereum address from public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Keccak256 hash of public key (without 0x04 prefix)
    let hash = keccak256(&pubkey_slice[1..]);

    // Take last 20 bytes as address
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(CryptoError::InvalidRecoveryId(v)),
    };

    RecoveryId::try_from(id).map_err(|_| CryptoError::InvalidRecoveryId(v))
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Ethereum address of this key.
    pub fn address(&self) -> Address {
        address_from_pubkey(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte prehash, returning `r || s || v` with `v` in {27, 28}.
    pub fn sign_prehash(&self, message_hash: &Hash) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(message_hash)
            .map_err(|_| CryptoError::InvalidPrivateKey)?;

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + 27;
        Ok(out)
    }

    /// `personal_sign`: EIP-191 hash then sign, returned as `0x`-prefixed hex.
    pub fn sign_personal(&self, message: &[u8]) -> Result<String, CryptoError> {
        let sig = self.sign_prehash(&eip191_hash(message))?;
        Ok(format!("0x{}", hex::encode(sig)))
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

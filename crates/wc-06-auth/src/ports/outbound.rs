//! # Outbound Ports (Driven Ports / SPI)

use crate::domain::errors::AuthError;
use async_trait::async_trait;
use shared_crypto::Hash;

/// EIP-1271 `isValidSignature` check against a smart-contract account.
#[async_trait]
pub trait ContractSignatureVerifier: Send + Sync {
    /// `Ok(false)` means the contract rejected the signature; `Err` means
    /// the check itself could not be made.
    async fn is_valid_signature(
        &self,
        address: &str,
        hash: &Hash,
        signature: &[u8],
        chain_id: &str,
    ) -> Result<bool, AuthError>;
}

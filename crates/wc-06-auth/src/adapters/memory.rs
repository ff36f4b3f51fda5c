use crate::domain::errors::AuthError;
use crate::ports::outbound::ContractSignatureVerifier;
use async_trait::async_trait;
use shared_crypto::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

/// No chain access. Every EIP-1271 check fails with `SignatureVerifier`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContractVerifier;

#[async_trait]
impl ContractSignatureVerifier for NoContractVerifier {
    async fn is_valid_signature(
        &self,
        address: &str,
        _hash: &Hash,
        _signature: &[u8],
        chain_id: &str,
    ) -> Result<bool, AuthError> {
        Err(AuthError::SignatureVerifier(format!(
            "no contract verifier configured for {address} on {chain_id}"
        )))
    }
}

/// Answers every check with the same verdict and counts the calls.
#[derive(Debug, Default)]
pub struct StaticContractVerifier {
    valid: bool,
    calls: AtomicUsize,
}

impl StaticContractVerifier {
    pub fn new(valid: bool) -> Self {
        Self {
            valid,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContractSignatureVerifier for StaticContractVerifier {
    async fn is_valid_signature(
        &self,
        _address: &str,
        _hash: &Hash,
        _signature: &[u8],
        _chain_id: &str,
    ) -> Result<bool, AuthError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.valid)
    }
}

use crate::domain::errors::VerifyError;
use crate::ports::outbound::AttestationSource;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Never has an attestation. Every context resolves to `Unknown`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttestation;

#[async_trait]
impl AttestationSource for NoAttestation {
    async fn fetch_origin(&self, _attestation_id: &str) -> Result<Option<String>, VerifyError> {
        Ok(None)
    }
}

/// Attestations registered up front, keyed by attestation id.
#[derive(Debug, Default)]
pub struct StaticAttestations {
    origins: RwLock<HashMap<String, String>>,
}

impl StaticAttestations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, attestation_id: impl Into<String>, origin: impl Into<String>) {
        self.origins
            .write()
            .insert(attestation_id.into(), origin.into());
    }
}

#[async_trait]
impl AttestationSource for StaticAttestations {
    async fn fetch_origin(&self, attestation_id: &str) -> Result<Option<String>, VerifyError> {
        Ok(self.origins.read().get(attestation_id).cloned())
    }
}

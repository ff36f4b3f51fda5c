//! # Outbound Ports

use crate::domain::errors::VerifyError;
use async_trait::async_trait;

/// Where attestations come from.
#[async_trait]
pub trait AttestationSource: Send + Sync {
    /// The origin attested for `attestation_id`, or `None` if there is no
    /// attestation.
    async fn fetch_origin(&self, attestation_id: &str) -> Result<Option<String>, VerifyError>;

    /// Base URL reported in the resulting context, if any.
    fn verify_url(&self) -> Option<&str> {
        None
    }
}

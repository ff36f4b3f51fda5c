//! # Verify Context Resolver
//!
//! Bounded, infallible wrapper around an [`AttestationSource`]. Whatever
//! the source does (error, no answer, slow answer) the caller gets a
//! context within the configured timeout.

use crate::adapters::memory::NoAttestation;
use crate::domain::entities::{Validation, VerifyContext};
use crate::domain::errors::VerifyError;
use crate::ports::outbound::AttestationSource;
use shared_crypto::sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct VerifyContextResolver {
    source: Arc<dyn AttestationSource>,
    timeout: Duration,
}

impl VerifyContextResolver {
    pub fn new(source: Arc<dyn AttestationSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// A resolver that always answers `Unknown`.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoAttestation), Duration::from_secs(1))
    }

    /// Attestations are keyed by the SHA-256 of the published ciphertext.
    pub fn attestation_id(ciphertext: &str) -> String {
        hex::encode(sha256(ciphertext.as_bytes()))
    }

    /// Resolve the context for one inbound request. Never fails.
    pub async fn resolve(&self, attestation_id: &str, claimed_origin: Option<&str>) -> VerifyContext {
        let lookup = tokio::time::timeout(self.timeout, self.source.fetch_origin(attestation_id));
        let attested = match lookup.await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::Timeout),
        };

        let validation = match (&attested, claimed_origin) {
            (Ok(Some(origin)), Some(claimed)) if origin == claimed => Validation::Valid,
            (Ok(Some(_)), Some(_)) => Validation::Invalid,
            (Ok(_), _) => Validation::Unknown,
            (Err(e), _) => {
                debug!(attestation_id, error = %e, "[wc-05] attestation unavailable");
                Validation::Unknown
            }
        };

        VerifyContext {
            validation,
            origin: claimed_origin.map(str::to_string),
            verify_url: self.source.verify_url().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::StaticAttestations;
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl AttestationSource for Failing {
        async fn fetch_origin(&self, _: &str) -> Result<Option<String>, VerifyError> {
            Err(VerifyError::Unreachable("connection refused".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl AttestationSource for Slow {
        async fn fetch_origin(&self, _: &str) -> Result<Option<String>, VerifyError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some("https://late.example".into()))
        }
    }

    fn resolver(source: impl AttestationSource + 'static) -> VerifyContextResolver {
        VerifyContextResolver::new(Arc::new(source), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_matching_origin_is_valid() {
        let source = StaticAttestations::new();
        source.insert("abc", "https://app.example");
        let ctx = resolver(source).resolve("abc", Some("https://app.example")).await;
        assert_eq!(ctx.validation, Validation::Valid);
        assert_eq!(ctx.origin.as_deref(), Some("https://app.example"));
    }

    #[tokio::test]
    async fn test_mismatched_origin_is_invalid() {
        let source = StaticAttestations::new();
        source.insert("abc", "https://evil.example");
        let ctx = resolver(source).resolve("abc", Some("https://app.example")).await;
        assert_eq!(ctx.validation, Validation::Invalid);
    }

    #[tokio::test]
    async fn test_missing_attestation_or_claim_is_unknown() {
        let source = StaticAttestations::new();
        source.insert("abc", "https://app.example");
        let r = resolver(source);
        assert_eq!(r.resolve("other", Some("https://app.example")).await.validation, Validation::Unknown);
        assert_eq!(r.resolve("abc", None).await.validation, Validation::Unknown);
    }

    #[tokio::test]
    async fn test_failures_collapse_to_unknown() {
        let ctx = resolver(Failing).resolve("abc", Some("https://app.example")).await;
        assert_eq!(ctx.validation, Validation::Unknown);

        let started = std::time::Instant::now();
        let ctx = resolver(Slow).resolve("abc", Some("https://app.example")).await;
        assert_eq!(ctx.validation, Validation::Unknown);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_attestation_id_is_sha256_hex() {
        assert_eq!(
            VerifyContextResolver::attestation_id("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}

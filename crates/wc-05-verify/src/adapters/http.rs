//! Verify server lookups: `GET {verify_url}/attestation/{id}` returning
//! `{"origin": "..."}`. A 404 means no attestation.

use crate::domain::errors::VerifyError;
use crate::ports::outbound::AttestationSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    origin: String,
}

pub struct HttpAttestationSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAttestationSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerifyError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AttestationSource for HttpAttestationSource {
    async fn fetch_origin(&self, attestation_id: &str) -> Result<Option<String>, VerifyError> {
        let url = format!("{}/attestation/{attestation_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VerifyError::Unreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(VerifyError::Unreachable(format!("status {}", response.status())));
        }

        let body: AttestationResponse = response
            .json()
            .await
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        Ok(Some(body.origin))
    }

    fn verify_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}

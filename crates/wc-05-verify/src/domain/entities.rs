//! # Verify Entities

use serde::{Deserialize, Serialize};

/// Whether a request's claimed origin matches the attested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validation {
    /// No attestation could be obtained.
    #[default]
    Unknown,
    Valid,
    Invalid,
}

/// Advisory context attached to an inbound request. Never persisted with
/// the request itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifyContext {
    pub validation: Validation,
    /// The origin the requester claimed (its metadata URL).
    pub origin: Option<String>,
    pub verify_url: Option<String>,
}

impl VerifyContext {
    pub fn unknown(origin: Option<String>) -> Self {
        Self {
            validation: Validation::Unknown,
            origin,
            verify_url: None,
        }
    }
}

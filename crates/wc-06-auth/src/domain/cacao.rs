//! # CACAO
//!
//! Chain-agnostic object capability: the claims a wallet signs plus the
//! signature. Wire layout `{h, p, s}`.

use super::errors::AuthError;
use serde::{Deserialize, Serialize};

/// Message format identifier.
pub const CACAO_TYPE_EIP4361: &str = "eip4361";
pub const CACAO_VERSION: &str = "1";

/// Claims the requester asks a wallet to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacaoPayload {
    #[serde(rename = "type")]
    pub kind: String,
    /// CAIP-2 chain id, e.g. `eip155:1`.
    pub chain_id: String,
    pub domain: String,
    pub aud: String,
    pub version: String,
    pub nonce: String,
    /// RFC 3339 issue time.
    pub iat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacaoHeader {
    pub t: String,
}

impl Default for CacaoHeader {
    fn default() -> Self {
        Self {
            t: CACAO_TYPE_EIP4361.to_string(),
        }
    }
}

/// Signed claims: the request payload with the signer's DID in place of
/// the chain id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacaoClaims {
    pub iss: String,
    pub domain: String,
    pub aud: String,
    pub version: String,
    pub nonce: String,
    pub iat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
}

impl CacaoClaims {
    pub fn new(payload: &CacaoPayload, iss: impl Into<String>) -> Self {
        Self {
            iss: iss.into(),
            domain: payload.domain.clone(),
            aud: payload.aud.clone(),
            version: payload.version.clone(),
            nonce: payload.nonce.clone(),
            iat: payload.iat.clone(),
            nbf: payload.nbf.clone(),
            exp: payload.exp.clone(),
            statement: payload.statement.clone(),
            request_id: payload.request_id.clone(),
            resources: payload.resources.clone(),
        }
    }
}

/// Closed set of signature kinds. Verification dispatches on the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum CacaoSignature {
    /// Personal-message signature by an externally owned account.
    Eip191 { s: String },
    /// Signature checked by the account's contract (`isValidSignature`).
    Eip1271 { s: String },
}

impl CacaoSignature {
    pub fn eip191(signature: impl Into<String>) -> Self {
        Self::Eip191 { s: signature.into() }
    }

    pub fn eip1271(signature: impl Into<String>) -> Self {
        Self::Eip1271 { s: signature.into() }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Eip191 { s } | Self::Eip1271 { s } => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cacao {
    pub h: CacaoHeader,
    pub p: CacaoClaims,
    pub s: CacaoSignature,
}

/// A `did:pkh:{namespace}:{reference}:{address}` issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub namespace: String,
    pub reference: String,
    pub address: String,
}

impl Issuer {
    pub fn parse(did: &str) -> Result<Self, AuthError> {
        let invalid = || AuthError::InvalidIssuer(did.to_string());
        let parts: Vec<&str> = did.split(':').collect();
        match parts.as_slice() {
            ["did", "pkh", namespace, reference, address]
                if !namespace.is_empty() && !reference.is_empty() && !address.is_empty() =>
            {
                Ok(Self {
                    namespace: (*namespace).to_string(),
                    reference: (*reference).to_string(),
                    address: (*address).to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// CAIP-2 chain id, e.g. `eip155:1`.
    pub fn chain_id(&self) -> String {
        format!("{}:{}", self.namespace, self.reference)
    }
}

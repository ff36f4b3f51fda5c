//! EIP-1271 over Ethereum JSON-RPC.
//!
//! `eth_call` of `isValidSignature(bytes32 hash, bytes signature)` on the
//! issuer's contract, posted to `{rpc_url}?chainId={chainId}&projectId={projectId}`.
//! The contract approves by returning the function selector.

use crate::domain::errors::AuthError;
use crate::ports::outbound::ContractSignatureVerifier;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use shared_crypto::Hash;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RPC_URL: &str = "https://rpc.walletconnect.com/v1";

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`.
pub const IS_VALID_SIGNATURE_SELECTOR: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

#[derive(Debug, Deserialize)]
struct RpcReply {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

pub struct RpcContractVerifier {
    client: reqwest::Client,
    rpc_url: String,
    project_id: String,
}

impl RpcContractVerifier {
    pub fn new(
        rpc_url: impl Into<String>,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::SignatureVerifier(e.to_string()))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            project_id: project_id.into(),
        })
    }
}

/// ABI-encode the call data: selector, hash, offset of the bytes argument,
/// its length and the signature right-padded to a 32-byte boundary.
pub fn encode_call(hash: &Hash, signature: &[u8]) -> String {
    let mut data = Vec::with_capacity(4 + 32 * 3 + signature.len() + 32);
    data.extend_from_slice(&IS_VALID_SIGNATURE_SELECTOR);
    data.extend_from_slice(hash);
    data.extend_from_slice(&word(0x40));
    data.extend_from_slice(&word(signature.len() as u64));
    data.extend_from_slice(signature);
    let padding = (32 - signature.len() % 32) % 32;
    data.extend(std::iter::repeat(0u8).take(padding));
    format!("0x{}", hex::encode(data))
}

fn word(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Whether an `eth_call` result carries the magic value.
pub fn is_magic_value(result: &str) -> bool {
    let magic = hex::encode(IS_VALID_SIGNATURE_SELECTOR);
    result
        .strip_prefix("0x")
        .unwrap_or(result)
        .to_ascii_lowercase()
        .starts_with(&magic)
}

#[async_trait]
impl ContractSignatureVerifier for RpcContractVerifier {
    async fn is_valid_signature(
        &self,
        address: &str,
        hash: &Hash,
        signature: &[u8],
        chain_id: &str,
    ) -> Result<bool, AuthError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": shared_types::payload_id(),
            "method": "eth_call",
            "params": [{ "to": address, "data": encode_call(hash, signature) }, "latest"],
        });

        let reply: RpcReply = self
            .client
            .post(&self.rpc_url)
            .query(&[("chainId", chain_id), ("projectId", self.project_id.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::SignatureVerifier(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::SignatureVerifier(e.to_string()))?;

        if let Some(error) = reply.error {
            debug!(address, chain_id, %error, "[wc-06] isValidSignature call reverted");
            return Ok(false);
        }
        Ok(reply.result.as_deref().is_some_and(is_magic_value))
    }
}

//! # CACAO Verification
//!
//! Dispatch on the signature tag:
//!
//! | Tag | Check |
//! |-----|-------|
//! | `eip191` | recover the signer from the canonical message, compare with the issuer address |
//! | `eip1271` | ask the issuer's contract via [`ContractSignatureVerifier`] |
//!
//! The message is rendered from the requester's own payload, never from
//! the claims echoed back by the wallet.

use super::cacao::{Cacao, CacaoClaims, CacaoPayload, CacaoSignature, Issuer};
use super::errors::AuthError;
use super::message::format_message;
use crate::ports::outbound::ContractSignatureVerifier;
use shared_crypto::{eip191_hash, format_address, parse_address, recover_address};

fn decode_signature(raw: &str) -> Result<Vec<u8>, AuthError> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| AuthError::InvalidSignature(format!("signature is not hex: {e}")))
}

/// Verify `cacao` as an answer to `requested`.
pub async fn verify_cacao(
    cacao: &Cacao,
    requested: &CacaoPayload,
    contracts: &dyn ContractSignatureVerifier,
) -> Result<(), AuthError> {
    let issuer = Issuer::parse(&cacao.p.iss)?;
    if cacao.p != CacaoClaims::new(requested, cacao.p.iss.clone()) {
        return Err(AuthError::InvalidSignature(
            "signed claims differ from the request".into(),
        ));
    }

    let message = format_message(requested, &cacao.p.iss)?;
    let hash = eip191_hash(message.as_bytes());
    let signature = decode_signature(cacao.s.raw())?;

    match &cacao.s {
        CacaoSignature::Eip191 { .. } => {
            let expected = parse_address(&issuer.address)
                .map_err(|_| AuthError::InvalidIssuer(cacao.p.iss.clone()))?;
            let recovered = recover_address(&hash, &signature)
                .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
            if recovered != expected {
                return Err(AuthError::InvalidSignature(format!(
                    "recovered {} but issuer is {}",
                    format_address(&recovered),
                    issuer.address
                )));
            }
            Ok(())
        }
        CacaoSignature::Eip1271 { .. } => {
            let valid = contracts
                .is_valid_signature(&issuer.address, &hash, &signature, &issuer.chain_id())
                .await?;
            if valid {
                Ok(())
            } else {
                Err(AuthError::InvalidSignature(format!(
                    "contract {} rejected the signature",
                    issuer.address
                )))
            }
        }
    }
}

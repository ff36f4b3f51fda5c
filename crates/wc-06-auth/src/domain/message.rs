//! # Canonical Signing Message
//!
//! EIP-4361 plaintext rendered from a [`CacaoPayload`] and the signer's
//! DID. Both peers must render byte-identical text: the requester
//! verifies the signature against its own rendering.
//!
//! ```text
//! {domain} wants you to sign in with your Ethereum account:
//! {address}
//!
//! {statement}
//!
//! URI: {aud}
//! Version: {version}
//! Chain ID: {reference}
//! Nonce: {nonce}
//! Issued At: {iat}
//! Expiration Time: {exp}
//! Not Before: {nbf}
//! Request ID: {requestId}
//! Resources:
//! - {resource}
//! ```

use super::cacao::{CacaoPayload, Issuer};
use super::errors::AuthError;

/// Render the message the wallet signs. Pure: equal inputs give equal
/// output.
pub fn format_message(payload: &CacaoPayload, iss: &str) -> Result<String, AuthError> {
    let issuer = Issuer::parse(iss)?;

    let mut lines = vec![
        format!("{} wants you to sign in with your Ethereum account:", payload.domain),
        issuer.address.clone(),
        String::new(),
    ];
    if let Some(statement) = &payload.statement {
        lines.push(statement.clone());
    }
    lines.push(String::new());
    lines.push(format!("URI: {}", payload.aud));
    lines.push(format!("Version: {}", payload.version));
    lines.push(format!("Chain ID: {}", issuer.reference));
    lines.push(format!("Nonce: {}", payload.nonce));
    lines.push(format!("Issued At: {}", payload.iat));
    if let Some(exp) = &payload.exp {
        lines.push(format!("Expiration Time: {exp}"));
    }
    if let Some(nbf) = &payload.nbf {
        lines.push(format!("Not Before: {nbf}"));
    }
    if let Some(request_id) = &payload.request_id {
        lines.push(format!("Request ID: {request_id}"));
    }
    if let Some(resources) = payload.resources.as_ref().filter(|r| !r.is_empty()) {
        lines.push("Resources:".to_string());
        lines.extend(resources.iter().map(|r| format!("- {r}")));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cacao::{CACAO_TYPE_EIP4361, CACAO_VERSION};

    const ISS: &str = "did:pkh:eip155:1:0x5ccD2FD3e1a8f3A3a6d0F3d5bB3c3d3E1fA8a3B2";

    fn payload() -> CacaoPayload {
        CacaoPayload {
            kind: CACAO_TYPE_EIP4361.into(),
            chain_id: "eip155:1".into(),
            domain: "localhost".into(),
            aud: "http://localhost:3000/login".into(),
            version: CACAO_VERSION.into(),
            nonce: "100".into(),
            iat: "2022-10-10T23:03:35.700Z".into(),
            nbf: None,
            exp: None,
            statement: None,
            request_id: None,
            resources: None,
        }
    }

    #[test]
    fn test_minimal_message() {
        let expected = "localhost wants you to sign in with your Ethereum account:\n\
            0x5ccD2FD3e1a8f3A3a6d0F3d5bB3c3d3E1fA8a3B2\n\
            \n\
            \n\
            URI: http://localhost:3000/login\n\
            Version: 1\n\
            Chain ID: 1\n\
            Nonce: 100\n\
            Issued At: 2022-10-10T23:03:35.700Z";
        assert_eq!(format_message(&payload(), ISS).unwrap(), expected);
    }

    #[test]
    fn test_full_message() {
        let mut p = payload();
        p.statement = Some("Sign in with wallet.".into());
        p.exp = Some("2022-10-11T23:03:35.700Z".into());
        p.nbf = Some("2022-10-10T23:03:35.700Z".into());
        p.request_id = Some("req-7".into());
        p.resources = Some(vec!["ipfs://Qm1".into(), "https://example.com/my-web2-claim.json".into()]);

        let expected = "localhost wants you to sign in with your Ethereum account:\n\
            0x5ccD2FD3e1a8f3A3a6d0F3d5bB3c3d3E1fA8a3B2\n\
            \n\
            Sign in with wallet.\n\
            \n\
            URI: http://localhost:3000/login\n\
            Version: 1\n\
            Chain ID: 1\n\
            Nonce: 100\n\
            Issued At: 2022-10-10T23:03:35.700Z\n\
            Expiration Time: 2022-10-11T23:03:35.700Z\n\
            Not Before: 2022-10-10T23:03:35.700Z\n\
            Request ID: req-7\n\
            Resources:\n\
            - ipfs://Qm1\n\
            - https://example.com/my-web2-claim.json";
        assert_eq!(format_message(&p, ISS).unwrap(), expected);
    }

    #[test]
    fn test_chain_id_comes_from_issuer() {
        let message = format_message(&payload(), "did:pkh:eip155:137:0xabc").unwrap();
        assert!(message.contains("\nChain ID: 137\n"));
    }

    #[test]
    fn test_deterministic() {
        let mut p = payload();
        p.statement = Some("hi".into());
        assert_eq!(format_message(&p, ISS).unwrap(), format_message(&p, ISS).unwrap());
    }

    #[test]
    fn test_rejects_bad_issuer() {
        assert!(matches!(
            format_message(&payload(), "0xabc"),
            Err(AuthError::InvalidIssuer(_))
        ));
    }
}

//! # Ports Layer
//!
//! - `inbound`: [`AuthApi`](inbound::AuthApi), what the application calls
//! - `outbound`: [`ContractSignatureVerifier`](outbound::ContractSignatureVerifier),
//!   the on-chain check behind EIP-1271 signatures

pub mod inbound;
pub mod outbound;

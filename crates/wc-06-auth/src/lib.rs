//! # Auth Protocol Engine (WC-06)
//!
//! Sign-in with a wallet over a pairing: the requester sends an EIP-4361
//! payload, the wallet signs the canonical message and answers with a
//! CACAO, the requester verifies it.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): CACAO types, canonical message,
//!   signature verification
//! - **Ports Layer** (`ports/`): `AuthApi`, `ContractSignatureVerifier`
//! - **Service Layer** (`service.rs`): `AuthEngine`
//! - **Adapters** (`adapters/`): contract verifiers
//!
//! ## Guarantees
//!
//! - A response only counts after its signature verifies against the
//!   message rendered from the requester's own payload.
//! - Verification failures and peer errors are emitted as
//!   `AuthEvent::Error`, never dropped.
//! - An error response never activates a pairing.
//! - History keeps every request record, answered or not.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::memory::{NoContractVerifier, StaticContractVerifier};
#[cfg(feature = "http")]
pub use adapters::rpc::{RpcContractVerifier, DEFAULT_RPC_URL};
pub use domain::cacao::{Cacao, CacaoClaims, CacaoHeader, CacaoPayload, CacaoSignature, Issuer};
pub use domain::config::AuthConfig;
pub use domain::entities::{
    generate_nonce, AuthEvent, AuthHistoryEntry, AuthRequest, AuthRequestParams, ErrorReason,
    PendingRequest, RequestParams, RequestUri, RespondParams,
};
pub use domain::errors::AuthError;
pub use domain::message::format_message;
pub use domain::methods::AUTH_REQUEST;
pub use domain::verification::verify_cacao;
pub use ports::inbound::AuthApi;
pub use ports::outbound::ContractSignatureVerifier;
pub use service::AuthEngine;

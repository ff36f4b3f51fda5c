//! # Adapters
//!
//! - `memory`: fixed-answer contract verifiers
//! - `rpc`: `isValidSignature` over Ethereum JSON-RPC (feature `http`)

pub mod memory;

#[cfg(feature = "http")]
pub mod rpc;

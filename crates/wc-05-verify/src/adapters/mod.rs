//! # Adapters
//!
//! - `memory`: fixed attestation table and the no-op source
//! - `http`: verify server lookups (feature `http`)

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

//! # Verify Context Resolver (WC-05)
//!
//! Side channel answering "did this request really come from the origin it
//! claims?". Consulted for every inbound auth request, never allowed to
//! block or fail it: any problem yields `Validation::Unknown`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(feature = "http")]
pub use adapters::http::HttpAttestationSource;
pub use adapters::memory::{NoAttestation, StaticAttestations};
pub use domain::config::VerifyConfig;
pub use domain::entities::{Validation, VerifyContext};
pub use domain::errors::VerifyError;
pub use ports::outbound::AttestationSource;
pub use service::VerifyContextResolver;

//! # Domain Layer
//!
//! CACAO types, the canonical signing message, signature checks, request
//! and event types.

pub mod cacao;
pub mod config;
pub mod entities;
pub mod errors;
pub mod message;
pub mod methods;
pub mod verification;

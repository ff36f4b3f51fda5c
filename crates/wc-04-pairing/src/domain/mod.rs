//! # Domain Layer
//!
//! Pairing records, the pairing URI codec, control-method constants.

pub mod config;
pub mod entities;
pub mod errors;
pub mod methods;
pub mod uri;

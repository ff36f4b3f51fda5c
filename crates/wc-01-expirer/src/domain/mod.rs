//! # Domain Layer
//!
//! Expiry targets, entries and notifications. No I/O.

pub mod entities;
pub mod errors;

//! # Domain Layer
//!
//! History records and their resolution rules.

pub mod entities;
pub mod errors;

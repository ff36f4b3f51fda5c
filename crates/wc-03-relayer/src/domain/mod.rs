//! # Domain Layer
//!
//! Publish options, relay messages, connection events, backoff policy.

pub mod backoff;
pub mod config;
pub mod entities;
pub mod errors;

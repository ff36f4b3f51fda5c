//! # Ports Layer
//!
//! - **Inbound (Driving)**: `ExpirerApi`, used by the pairing manager and
//!   the auth engine.
//!
//! Storage and time are the shared `KeyValueStore` / `TimeSource` ports.

pub mod inbound;

//! # Ports Layer
//!
//! - **Inbound (Driving)**: `RelayerApi`, used by the pairing manager and
//!   the client runtime
//! - **Outbound (Driven)**: `RelayTransport` / `RelaySession`, implemented
//!   by the in-memory hub and the WebSocket adapter

pub mod inbound;
pub mod outbound;

//! # Adapters
//!
//! - `memory`: process-local relay hub (always available)
//! - `websocket`: JSON-RPC over WebSocket to a real relay (feature `websocket`)

pub mod memory;

#[cfg(feature = "websocket")]
pub mod websocket;

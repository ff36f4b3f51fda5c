//! # Event Routing
//!
//! ```text
//! Relayer ──Message──▶ InboundRouter ──decode──┬─ pairing method ─▶ PairingManager
//!                                              ├─ other request ──▶ AuthEngine
//!                                              └─ response ───────▶ PairingManager, else AuthEngine
//!
//! Expirer ──Expired──▶ ExpiryRouter ──▶ PairingManager (topics), AuthEngine (ids)
//! ```
//!
//! Both routers run until the runtime's shutdown signal fires.

pub mod expiry;
pub mod inbound;

pub use expiry::ExpiryRouter;
pub use inbound::{InboundRouter, RouteOutcome};

//! # Ports Layer
//!
//! - **Inbound (Driving)**: `PairingApi`, used by the auth engine and the
//!   client runtime
//!
//! Outbound dependencies are the relayer's and expirer's own inbound
//! ports (`RelayerApi`, `ExpirerApi`), injected at construction.

pub mod inbound;

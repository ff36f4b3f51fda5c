//! # Pairing Manager Subsystem (WC-04)
//!
//! Owns the lifecycle of pairings: encrypted channels identified by a topic
//! derived from a shared symmetric key.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `Pairing`, URI codec, control methods
//! - **Ports Layer** (`ports/`): `PairingApi`
//! - **Service Layer** (`service.rs`): `PairingManager`
//!
//! ## Guarantees
//!
//! - At most one pairing per topic.
//! - Transitions on one topic never overlap.
//! - `active` only becomes true through `activate`, after a completed
//!   exchange.
//! - A removed pairing leaves no record, expiry entry or subscription
//!   behind.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::config::PairingConfig;
pub use domain::entities::{Pairing, PairingEvent, PairingState, RelayProtocol};
pub use domain::errors::PairingError;
pub use domain::methods::{is_pairing_method, DeleteParams, RpcMethod, PAIRING_DELETE, PAIRING_PING};
pub use domain::uri::PairingUri;
pub use ports::inbound::PairingApi;
pub use service::PairingManager;

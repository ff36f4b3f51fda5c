//! # Expirer Subsystem (WC-01)
//!
//! Generic TTL registry. Pairings register their topic, pending requests
//! register their id; a background sweep turns due deadlines into
//! `ExpirerEvent::Expired` notifications that the client runtime routes to
//! the owning component.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): targets, entries, events, errors
//! - **Ports Layer** (`ports/`): `ExpirerApi`
//! - **Service Layer** (`service.rs`): persisted registry + sweeper
//!
//! ## Guarantees
//!
//! - One entry per target; re-registering overwrites.
//! - `Expired` fires exactly once per entry.
//! - A missed sweep tick only delays notification; entries are never lost.

pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::entities::{ExpirerEvent, ExpiryEntry, ExpiryTarget};
pub use domain::errors::ExpirerError;
pub use ports::inbound::ExpirerApi;
pub use service::Expirer;

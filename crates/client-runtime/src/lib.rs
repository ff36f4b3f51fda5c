//! # Client Runtime
//!
//! Assembles one sign-in client from the `wc-0N` crates and runs the
//! background work that connects them. The `wc-demo` binary in `main.rs`
//! drives two of these against each other.
//!
//! ## Layout
//!
//! - `container/` - configuration and dependency-ordered construction
//! - `wiring/` - routing of relay messages and expirations
//! - `runtime` - start/shutdown of the background tasks
//!
//! ```text
//!   Relayer ──Message──▶ InboundRouter ──▶ PairingManager | AuthEngine
//!   Expirer ──Expired──▶ ExpiryRouter  ──▶ PairingManager | AuthEngine
//! ```

#![allow(clippy::type_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod container;
pub mod runtime;
pub mod wiring;

pub use container::{ClientConfig, Components, ComponentsBuilder, ConfigError, RuntimeError};
pub use runtime::ClientRuntime;
pub use wiring::{ExpiryRouter, InboundRouter, RouteOutcome};

//! # WC-Auth Test Suite
//!
//! Two complete clients talking through one [`InMemoryRelay`](wc_03_relayer::InMemoryRelay).
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Client fixtures and signing helpers
//! └── integration/
//!     ├── pairing_flows.rs   # create / pair / ping / disconnect
//!     └── auth_flows.rs      # request / respond / verify / history
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p wc-tests
//! cargo test -p wc-tests integration::auth_flows::
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod harness;
pub mod integration;

//! # Component Container
//!
//! Builds every component of one client in dependency order and holds the
//! shared handles. Components reference each other only through the
//! handles injected here.

pub mod components;
pub mod config;

pub use components::{Components, ComponentsBuilder, RuntimeError};
pub use config::{ClientConfig, ConfigError, ExpirerConfig, StorageConfig};

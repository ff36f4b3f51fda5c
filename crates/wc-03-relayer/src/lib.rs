//! # Relayer Client Subsystem (WC-03)
//!
//! Topic-scoped publish/subscribe against an external store-and-forward
//! relay, with connection-state events and automatic reconnection.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  publish/subscribe  ┌──────────┐  RelaySession  ┌───────────┐
//! │ Pairing (04)  │ ──────────────────▶ │ Relayer  │ ─────────────▶ │ transport │
//! │ Runtime       │ ◀── RelayerEvent ── │          │ ◀── inbound ── │ (memory / │
//! └───────────────┘                     └──────────┘                │  ws)      │
//!                                                                   └───────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Every publish attempt emits `RelayerEvent::Publish` with the exact
//!   options used, before the message leaves the process.
//! - Subscriptions are restored on reconnect before queued publishes flush.
//! - Redelivered messages inside the de-duplication window are dropped.
//! - Messages on topics without a local subscription are dropped.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::memory::{InMemoryRelay, InMemoryTransport};
#[cfg(feature = "websocket")]
pub use adapters::websocket::WebSocketTransport;
pub use domain::backoff::calculate_backoff_delay;
pub use domain::config::RelayerConfig;
pub use domain::entities::{
    DisconnectedPolicy, PublishOptions, RelayMessage, RelayerEvent, SubscriptionHandle,
};
pub use domain::errors::RelayerError;
pub use ports::inbound::RelayerApi;
pub use ports::outbound::{RelaySession, RelayTransport, TransportConnection};
pub use service::Relayer;

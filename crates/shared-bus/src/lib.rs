//! # Shared Bus - Typed Event Registry
//!
//! Every client owns one [`EventBus`] per event family (relayer, pairing,
//! auth). There is no process-wide bus: a component receives the bus it
//! publishes to at construction time.
//!
//! ## Subscription Model
//!
//! ```text
//! ┌──────────────┐   publish(e)   ┌──────────────┐   mpsc   ┌──────────────┐
//! │  Component   │ ─────────────▶ │ EventBus<E>  │ ───────▶ │ Subscription │
//! └──────────────┘                │  id → sender │          │  (token)     │
//!                                 └──────────────┘          └──────────────┘
//! ```
//!
//! - `subscribe()` returns a [`Subscription`] whose id is the handler token.
//! - Dropping the subscription, or calling `unsubscribe(id)`, removes the
//!   handler before the next publish. Teardown is deterministic.
//! - Each subscriber has its own unbounded queue, so a slow subscriber never
//!   causes another to miss events.
//!
//! ## Request Correlation
//!
//! [`PendingRequestStore`] pairs an outbound request id with the task
//! awaiting its response.
//!
//! ## Per-Key Serialization
//!
//! [`KeyedLocks`] gives each topic (or request id) its own async mutex so
//! state transitions on one key never overlap.
//!
//! ## Inbound De-duplication
//!
//! [`TimeBoundedMessageCache`] collapses at-least-once relay delivery into
//! at-most-once processing within a time window.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod keyed_lock;
pub mod message_cache;
pub mod pending;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use keyed_lock::KeyedLocks;
pub use message_cache::TimeBoundedMessageCache;
pub use pending::{PendingRequestStore, PendingStats};
pub use publisher::{EventBus, EventPublisher};
pub use subscriber::{Subscription, SubscriptionError, SubscriptionId};

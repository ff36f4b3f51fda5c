//! # Inbound Ports (Driving Ports / API)

use crate::domain::entities::{ExpirerEvent, ExpiryTarget};
use crate::domain::errors::ExpirerError;
use shared_bus::Subscription;

/// TTL registry.
///
/// One entry per target; registering an existing target overwrites it.
pub trait ExpirerApi: Send + Sync {
    /// Set `expires_at = now + ttl_secs`. Returns the deadline.
    fn register(&self, target: ExpiryTarget, ttl_secs: u64) -> Result<u64, ExpirerError>;

    /// Set an absolute deadline (unix seconds), e.g. one agreed in a URI.
    fn register_at(&self, target: ExpiryTarget, expires_at: u64) -> Result<(), ExpirerError>;

    /// Idempotent removal.
    fn unregister(&self, target: &ExpiryTarget) -> Result<(), ExpirerError>;

    fn has(&self, target: &ExpiryTarget) -> bool;

    /// Deadline for `target`, if registered.
    fn get(&self, target: &ExpiryTarget) -> Option<u64>;

    /// Subscribe to created / deleted / expired notifications.
    fn subscribe(&self) -> Subscription<ExpirerEvent>;
}

//! # Expirer Service
//!
//! In-memory map of deadlines mirrored to the key-value store under
//! `expirer:{target}`. A periodic sweep removes due entries and emits one
//! `Expired` notification per entry.
//!
//! ## Locking
//!
//! The map is guarded by a short `parking_lot::Mutex`. The sweep only holds
//! it while collecting due entries; persistence of the removals and event
//! delivery happen after the lock is released.

use crate::domain::entities::{ExpirerEvent, ExpiryEntry, ExpiryTarget};
use crate::domain::errors::ExpirerError;
use crate::ports::inbound::ExpirerApi;
use parking_lot::Mutex;
use shared_bus::{EventBus, EventPublisher, Subscription};
use shared_types::{
    scan_json, write_json, BatchOperation, CancelSignal, KeyValueStore, TimeSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Storage key prefix for expiry entries.
pub const STORAGE_PREFIX: &str = "expirer:";

fn storage_key(target: &ExpiryTarget) -> String {
    format!("{STORAGE_PREFIX}{target}")
}

pub struct Expirer {
    entries: Mutex<HashMap<ExpiryTarget, u64>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    events: EventBus<ExpirerEvent>,
}

impl Expirer {
    /// Create the expirer, restoring any entries persisted in `store`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, ExpirerError> {
        let restored: Vec<ExpiryEntry> = scan_json(store.as_ref(), STORAGE_PREFIX)?;
        if !restored.is_empty() {
            info!(entries = restored.len(), "[wc-01] restored expiry entries");
        }
        let entries = restored
            .into_iter()
            .map(|e| (e.target, e.expires_at))
            .collect();

        Ok(Self {
            entries: Mutex::new(entries),
            store,
            clock,
            events: EventBus::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of all entries, soonest first.
    pub fn entries(&self) -> Vec<ExpiryEntry> {
        let mut out: Vec<ExpiryEntry> = self
            .entries
            .lock()
            .iter()
            .map(|(target, &expires_at)| ExpiryEntry {
                target: target.clone(),
                expires_at,
            })
            .collect();
        out.sort_by_key(|e| e.expires_at);
        out
    }

    /// Remove every entry with `expires_at <= now` and emit `Expired` for
    /// each. Returns the expired targets.
    pub fn sweep(&self) -> Vec<ExpiryTarget> {
        let now = self.clock.now_secs();

        let due: Vec<(ExpiryTarget, u64)> = {
            let mut entries = self.entries.lock();
            let due: Vec<(ExpiryTarget, u64)> = entries
                .iter()
                .filter(|(_, &at)| at <= now)
                .map(|(t, &at)| (t.clone(), at))
                .collect();
            for (target, _) in &due {
                entries.remove(target);
            }
            due
        };

        if due.is_empty() {
            return Vec::new();
        }

        let deletes = due
            .iter()
            .map(|(t, _)| BatchOperation::delete(storage_key(t)))
            .collect();
        if let Err(e) = self.store.atomic_batch_write(deletes) {
            // Memory already dropped the entries; a restart re-expires them.
            warn!(error = %e, "[wc-01] failed to persist expired entries");
        }

        let mut expired = Vec::with_capacity(due.len());
        for (target, expires_at) in due {
            debug!(target = %target, expires_at, "[wc-01] ⏰ expired");
            self.events.publish(ExpirerEvent::Expired {
                target: target.clone(),
                expires_at,
            });
            expired.push(target);
        }
        expired
    }

    /// Run `sweep` every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancelSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                    _ = shutdown.cancelled() => {
                        debug!("[wc-01] sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    fn set(&self, target: ExpiryTarget, expires_at: u64) -> Result<(), ExpirerError> {
        {
            let mut entries = self.entries.lock();
            write_json(
                self.store.as_ref(),
                &storage_key(&target),
                &ExpiryEntry {
                    target: target.clone(),
                    expires_at,
                },
            )?;
            entries.insert(target.clone(), expires_at);
        }
        debug!(target = %target, expires_at, "[wc-01] registered");
        self.events
            .publish(ExpirerEvent::Created { target, expires_at });
        Ok(())
    }
}

impl ExpirerApi for Expirer {
    fn register(&self, target: ExpiryTarget, ttl_secs: u64) -> Result<u64, ExpirerError> {
        let expires_at = self.clock.now_secs().saturating_add(ttl_secs);
        self.set(target, expires_at)?;
        Ok(expires_at)
    }

    fn register_at(&self, target: ExpiryTarget, expires_at: u64) -> Result<(), ExpirerError> {
        self.set(target, expires_at)
    }

    fn unregister(&self, target: &ExpiryTarget) -> Result<(), ExpirerError> {
        let removed = {
            let mut entries = self.entries.lock();
            if !entries.contains_key(target) {
                return Ok(());
            }
            self.store.delete(&storage_key(target))?;
            entries.remove(target).is_some()
        };
        if removed {
            debug!(target = %target, "[wc-01] unregistered");
            self.events.publish(ExpirerEvent::Deleted {
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn has(&self, target: &ExpiryTarget) -> bool {
        self.entries.lock().contains_key(target)
    }

    fn get(&self, target: &ExpiryTarget) -> Option<u64> {
        self.entries.lock().get(target).copied()
    }

    fn subscribe(&self) -> Subscription<ExpirerEvent> {
        self.events.subscribe()
    }
}

//! # Pairing Manager
//!
//! Owns every pairing and its expiry entry. Records live in memory and are
//! mirrored to the key-value store under `pairing:{topic}`.
//!
//! ## State machine
//!
//! ```text
//! create ─▶ Proposed ─┐
//!                     ├─ activate ─▶ Active ─┐
//! pair ───▶ Paired ───┘                      ├─▶ removed (expired / disconnected)
//!    (either, before activation) ────────────┘
//! ```
//!
//! Transitions take the topic's lock from [`KeyedLocks`]. A ping holds no
//! lock while it waits for the peer.

use crate::domain::config::PairingConfig;
use crate::domain::entities::{Pairing, PairingEvent, PairingState, RelayProtocol};
use crate::domain::errors::PairingError;
use crate::domain::methods::{DeleteParams, PAIRING_DELETE, PAIRING_PING};
use crate::domain::uri::PairingUri;
use crate::ports::inbound::PairingApi;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared_bus::{EventBus, EventPublisher, KeyedLocks, PendingRequestStore, Subscription};
use shared_crypto::{decrypt, encrypt, SymKey};
use shared_types::{
    scan_json, write_json, CancelSignal, JsonRpcPayload, JsonRpcRequest, JsonRpcResult,
    KeyValueStore, Metadata, ResponseOutcome, TimeSource, Topic,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use wc_01_expirer::{ExpirerApi, ExpiryTarget};
use wc_03_relayer::{PublishOptions, RelayerApi};
use wc_telemetry::log_topic_event;

/// Storage key prefix for pairing records.
pub const STORAGE_PREFIX: &str = "pairing:";

fn storage_key(topic: &Topic) -> String {
    format!("{STORAGE_PREFIX}{topic}")
}

/// Undoes a partial install unless disarmed. Dropping it armed (the
/// install future was dropped mid-way) clears storage and expiry at once
/// and hands the relay unsubscribe to the runtime. That task takes the
/// topic lock and leaves the subscription alone if the topic was
/// installed again in the meantime.
struct InstallRollback<'a> {
    manager: &'a PairingManager,
    topic: Topic,
    armed: bool,
}

impl InstallRollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }

    async fn undo(mut self) {
        self.armed = false;
        self.manager.discard_install(&self.topic);
        if let Err(e) = self.manager.relayer.unsubscribe_topic(&self.topic).await {
            warn!(topic = %self.topic.short(), error = %e, "[wc-04] rollback: failed to unsubscribe");
        }
    }
}

impl Drop for InstallRollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!(topic = %self.topic.short(), "[wc-04] install abandoned, rolling back");
        self.manager.discard_install(&self.topic);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let relayer = Arc::clone(&self.manager.relayer);
        let locks = Arc::clone(&self.manager.locks);
        let store = Arc::clone(&self.manager.store);
        let topic = self.topic.clone();
        runtime.spawn(async move {
            let guard = locks.lock(&topic).await;
            let reinstalled = matches!(store.get(&storage_key(&topic)), Ok(Some(_)));
            if !reinstalled {
                if let Err(e) = relayer.unsubscribe_topic(&topic).await {
                    warn!(topic = %topic.short(), error = %e, "[wc-04] rollback: failed to unsubscribe");
                }
            }
            drop(guard);
            locks.forget(&topic);
        });
    }
}

pub struct PairingManager {
    config: PairingConfig,
    relay: RelayProtocol,
    pairings: RwLock<HashMap<Topic, Pairing>>,
    locks: Arc<KeyedLocks<Topic>>,
    pings: PendingRequestStore<ResponseOutcome>,
    relayer: Arc<dyn RelayerApi>,
    expirer: Arc<dyn ExpirerApi>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    events: EventBus<PairingEvent>,
}

impl PairingManager {
    /// Create the manager, restoring persisted pairings. Restored pairings
    /// missing an expiry entry get one at their recorded deadline.
    pub fn new(
        config: PairingConfig,
        relay: RelayProtocol,
        relayer: Arc<dyn RelayerApi>,
        expirer: Arc<dyn ExpirerApi>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, PairingError> {
        let restored: Vec<Pairing> = scan_json(store.as_ref(), STORAGE_PREFIX)?;
        for pairing in &restored {
            let target = ExpiryTarget::Topic(pairing.topic.clone());
            if !expirer.has(&target) {
                expirer.register_at(target, pairing.expiry)?;
            }
        }
        if !restored.is_empty() {
            info!(pairings = restored.len(), "[wc-04] restored pairings");
        }

        Ok(Self {
            config,
            relay,
            pairings: RwLock::new(restored.into_iter().map(|p| (p.topic.clone(), p)).collect()),
            locks: Arc::new(KeyedLocks::new()),
            pings: PendingRequestStore::new(),
            relayer,
            expirer,
            store,
            clock,
            events: EventBus::new(),
        })
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Subscribe the relayer to every known topic. Run once after startup
    /// so restored pairings receive traffic again.
    pub async fn resubscribe_all(&self) {
        let topics: Vec<Topic> = self.pairings.read().keys().cloned().collect();
        for topic in topics {
            if let Err(e) = self.relayer.subscribe(&topic).await {
                warn!(topic = %topic.short(), error = %e, "[wc-04] resubscribe failed");
            }
        }
    }

    pub fn is_active(&self, topic: &Topic) -> bool {
        self.pairings.read().get(topic).is_some_and(|p| p.active)
    }

    // =========================================================================
    // Inbound control messages
    // =========================================================================

    /// Handle a decrypted `wc_pairingPing` / `wc_pairingDelete` request.
    pub async fn handle_request(&self, topic: &Topic, request: JsonRpcRequest) -> Result<(), PairingError> {
        if request.method == PAIRING_PING.name {
            log_topic_event!(debug, "wc-04", "[wc-04] ping received", topic.short(), id = request.id);
            self.events.publish(PairingEvent::Ping {
                topic: topic.clone(),
                id: request.id,
            });
            let ack = JsonRpcResult::new(request.id, Value::Bool(true));
            return self.send(topic, &ack.into(), PAIRING_PING.response).await;
        }

        if request.method == PAIRING_DELETE.name {
            let params: DeleteParams = serde_json::from_value(request.params)
                .map_err(|e| PairingError::Payload(e.to_string()))?;
            let guard = self.locks.lock(topic).await;
            if !self.pairings.read().contains_key(topic) {
                return Err(PairingError::NotFound(topic.clone()));
            }

            let ack = JsonRpcResult::new(request.id, Value::Bool(true));
            if let Err(e) = self.send(topic, &ack.into(), PAIRING_DELETE.response).await {
                debug!(topic = %topic.short(), error = %e, "[wc-04] delete ack not sent");
            }
            self.remove_local(topic).await;
            drop(guard);
            self.locks.forget(topic);

            log_topic_event!(info, "wc-04", "[wc-04] pairing deleted by peer", topic.short(), code = params.code);
            self.events.publish(PairingEvent::Delete {
                topic: topic.clone(),
                code: params.code,
                message: params.message,
            });
            return Ok(());
        }

        Err(PairingError::Payload(format!("unsupported method {}", request.method)))
    }

    /// Route a response to a waiting ping. Returns false if nothing here
    /// was waiting for it.
    pub fn handle_response(&self, payload: &JsonRpcPayload) -> bool {
        let id = payload.id();
        if !self.pings.contains(id) {
            return false;
        }
        match payload.clone().into_response() {
            Some((id, outcome)) => self.pings.complete(id, outcome),
            None => false,
        }
    }

    /// React to an expirer notification. Only topic targets concern pairings.
    pub async fn on_expired(&self, target: &ExpiryTarget) {
        let ExpiryTarget::Topic(topic) = target else {
            return;
        };
        let guard = self.locks.lock(topic).await;
        let Some(removed) = self.remove_local(topic).await else {
            return;
        };
        drop(guard);
        self.locks.forget(topic);

        log_topic_event!(info, "wc-04", "[wc-04] ⏰ pairing expired", topic.short(), active = removed.active);
        self.events.publish(PairingEvent::Expire {
            topic: topic.clone(),
        });
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn key_for(&self, topic: &Topic) -> Result<SymKey, PairingError> {
        self.pairings
            .read()
            .get(topic)
            .map(|p| p.sym_key.clone())
            .ok_or_else(|| PairingError::NotFound(topic.clone()))
    }

    /// Persist, register expiry, subscribe, then publish the record to
    /// memory. Undoes the earlier steps if a later one fails, if `cancel`
    /// fires, or if the future is dropped part way.
    async fn install(&self, pairing: Pairing, cancel: &CancelSignal) -> Result<Pairing, PairingError> {
        let topic = pairing.topic.clone();
        let rollback = InstallRollback {
            manager: self,
            topic: topic.clone(),
            armed: true,
        };

        match self.install_steps(&pairing, cancel).await {
            Ok(()) => {
                rollback.disarm();
                self.pairings.write().insert(topic, pairing.clone());
                Ok(pairing)
            }
            Err(e) => {
                rollback.undo().await;
                Err(e)
            }
        }
    }

    async fn install_steps(&self, pairing: &Pairing, cancel: &CancelSignal) -> Result<(), PairingError> {
        if cancel.is_cancelled() {
            return Err(PairingError::Cancelled);
        }
        write_json(self.store.as_ref(), &storage_key(&pairing.topic), pairing)?;
        self.expirer
            .register_at(ExpiryTarget::Topic(pairing.topic.clone()), pairing.expiry)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PairingError::Cancelled),
            r = self.relayer.subscribe(&pairing.topic) => r.map(|_| ()).map_err(PairingError::from),
        }
    }

    /// Synchronous part of undoing an install: storage and expiry.
    fn discard_install(&self, topic: &Topic) {
        if let Err(e) = self.expirer.unregister(&ExpiryTarget::Topic(topic.clone())) {
            warn!(topic = %topic.short(), error = %e, "[wc-04] rollback: failed to unregister expiry");
        }
        if let Err(e) = self.store.delete(&storage_key(topic)) {
            warn!(topic = %topic.short(), error = %e, "[wc-04] rollback: failed to delete pairing record");
        }
    }

    /// Drop every trace of `topic`. Caller holds the topic lock.
    async fn remove_local(&self, topic: &Topic) -> Option<Pairing> {
        let removed = self.pairings.write().remove(topic)?;
        if let Err(e) = self.store.delete(&storage_key(topic)) {
            warn!(topic = %topic.short(), error = %e, "[wc-04] failed to delete pairing record");
        }
        if let Err(e) = self.expirer.unregister(&ExpiryTarget::Topic(topic.clone())) {
            warn!(topic = %topic.short(), error = %e, "[wc-04] failed to unregister expiry");
        }
        if let Err(e) = self.relayer.unsubscribe_topic(topic).await {
            warn!(topic = %topic.short(), error = %e, "[wc-04] failed to unsubscribe");
        }
        Some(removed)
    }

    /// Apply `f` to the stored pairing and persist the result.
    fn update(&self, topic: &Topic, f: impl FnOnce(&mut Pairing)) -> Result<Pairing, PairingError> {
        let mut pairings = self.pairings.write();
        let current = pairings
            .get(topic)
            .ok_or_else(|| PairingError::NotFound(topic.clone()))?;
        let mut next = current.clone();
        f(&mut next);
        write_json(self.store.as_ref(), &storage_key(topic), &next)?;
        pairings.insert(topic.clone(), next.clone());
        Ok(next)
    }
}
#[async_trait]
impl PairingApi for PairingManager {
    async fn create(&self, expiry_secs: Option<u64>) -> Result<Pairing, PairingError> {
        let sym_key = SymKey::generate();
        let expiry = self
            .clock
            .now_secs()
            .saturating_add(expiry_secs.unwrap_or(self.config.proposal_ttl));
        let uri = PairingUri::new(sym_key.clone(), self.relay.clone(), expiry);
        let topic = uri.topic.clone();

        let _guard = self.locks.lock(&topic).await;
        let record = Pairing {
            topic: topic.clone(),
            sym_key,
            relay: self.relay.clone(),
            expiry,
            active: false,
            state: PairingState::Proposed,
            peer_metadata: None,
            uri: Some(uri.to_string()),
        };
        let pairing = self.install(record, &CancelSignal::never()).await?;

        log_topic_event!(info, "wc-04", "[wc-04] pairing created", topic.short(), expiry = expiry);
        self.events.publish(PairingEvent::Created {
            topic,
            state: PairingState::Proposed,
        });
        Ok(pairing)
    }

    async fn pair(&self, uri: &str, cancel: CancelSignal) -> Result<Pairing, PairingError> {
        let parsed = PairingUri::parse(uri)?;
        let now = self.clock.now_secs();
        let expiry = match parsed.expiry_timestamp {
            Some(ts) if ts <= now => {
                return Err(PairingError::InvalidUri(format!("expired at {ts}")));
            }
            Some(ts) => ts,
            None => now.saturating_add(self.config.proposal_ttl),
        };
        let topic = parsed.topic.clone();

        let _guard = self.locks.lock(&topic).await;
        if self.pairings.read().contains_key(&topic) {
            return Err(PairingError::AlreadyPaired(topic));
        }
        let record = Pairing {
            topic: topic.clone(),
            sym_key: parsed.sym_key,
            relay: parsed.relay,
            expiry,
            active: false,
            state: PairingState::Paired,
            peer_metadata: None,
            uri: None,
        };
        let pairing = self.install(record, &cancel).await?;

        log_topic_event!(info, "wc-04", "[wc-04] paired", topic.short(), expiry = expiry);
        self.events.publish(PairingEvent::Created {
            topic,
            state: PairingState::Paired,
        });
        Ok(pairing)
    }

    async fn activate(&self, topic: &Topic) -> Result<(), PairingError> {
        let _guard = self.locks.lock(topic).await;
        if self.is_active(topic) {
            return Ok(());
        }

        let expiry = self.clock.now_secs().saturating_add(self.config.active_ttl);
        let previous = self.get(topic).ok_or_else(|| PairingError::NotFound(topic.clone()))?;
        self.expirer
            .register_at(ExpiryTarget::Topic(topic.clone()), expiry)?;
        if let Err(e) = self.update(topic, |p| {
            p.active = true;
            p.state = PairingState::Active;
            p.expiry = expiry;
            p.uri = None;
        }) {
            if let Err(undo) = self
                .expirer
                .register_at(ExpiryTarget::Topic(topic.clone()), previous.expiry)
            {
                warn!(topic = %topic.short(), error = %undo, "[wc-04] rollback: failed to restore expiry");
            }
            return Err(e);
        }

        log_topic_event!(info, "wc-04", "[wc-04] ✅ pairing activated", topic.short(), expiry = expiry);
        self.events.publish(PairingEvent::Activated {
            topic: topic.clone(),
        });
        Ok(())
    }

    async fn update_metadata(&self, topic: &Topic, metadata: Metadata) -> Result<(), PairingError> {
        let _guard = self.locks.lock(topic).await;
        self.update(topic, |p| p.peer_metadata = Some(metadata))?;
        Ok(())
    }

    async fn ping(
        &self,
        topic: &Topic,
        timeout: Option<Duration>,
        cancel: CancelSignal,
    ) -> Result<(), PairingError> {
        if !self.pairings.read().contains_key(topic) {
            return Err(PairingError::NotFound(topic.clone()));
        }
        let timeout = timeout.unwrap_or(self.config.ping_timeout);

        let request = JsonRpcRequest::new(PAIRING_PING.name, json!({}));
        let id = request.id;
        let rx = self.pings.register(id, PAIRING_PING.name);
        if let Err(e) = self.send(topic, &request.into(), PAIRING_PING.request).await {
            self.pings.cancel(id);
            return Err(e);
        }
        self.events.publish(PairingEvent::Ping {
            topic: topic.clone(),
            id,
        });

        let outcome = tokio::select! {
            r = rx => r,
            _ = tokio::time::sleep(timeout) => {
                self.pings.cancel(id);
                return Err(PairingError::Timeout {
                    topic: topic.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            _ = cancel.cancelled() => {
                self.pings.cancel(id);
                return Err(PairingError::Cancelled);
            }
        };

        match outcome {
            Ok(ResponseOutcome::Result(_)) => {
                debug!(topic = %topic.short(), id, "[wc-04] pong");
                Ok(())
            }
            Ok(ResponseOutcome::Error(err)) => Err(PairingError::Peer {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(PairingError::Cancelled),
        }
    }

    async fn disconnect(&self, topic: &Topic) -> Result<(), PairingError> {
        let guard = self.locks.lock(topic).await;
        if !self.pairings.read().contains_key(topic) {
            return Err(PairingError::NotFound(topic.clone()));
        }

        let params = serde_json::to_value(DeleteParams::user_disconnected())
            .map_err(|e| PairingError::Payload(e.to_string()))?;
        let request = JsonRpcRequest::new(PAIRING_DELETE.name, params);
        self.send(topic, &request.into(), PAIRING_DELETE.request).await?;

        self.remove_local(topic).await;
        drop(guard);
        self.locks.forget(topic);
        log_topic_event!(info, "wc-04", "[wc-04] pairing disconnected", topic.short());
        Ok(())
    }

    async fn send(
        &self,
        topic: &Topic,
        payload: &JsonRpcPayload,
        opts: PublishOptions,
    ) -> Result<(), PairingError> {
        let key = self.key_for(topic)?;
        let plaintext = payload
            .to_json()
            .map_err(|e| PairingError::Payload(e.to_string()))?;
        let ciphertext = encrypt(&key, plaintext.as_bytes())?;
        self.relayer.publish(topic, &ciphertext, opts).await?;
        Ok(())
    }

    fn decode(&self, topic: &Topic, ciphertext: &str) -> Result<JsonRpcPayload, PairingError> {
        let key = self.key_for(topic)?;
        let plaintext = decrypt(&key, ciphertext)?;
        serde_json::from_slice(&plaintext).map_err(|e| PairingError::Payload(e.to_string()))
    }

    fn get(&self, topic: &Topic) -> Option<Pairing> {
        self.pairings.read().get(topic).cloned()
    }

    fn pairings(&self) -> Vec<Pairing> {
        let mut out: Vec<Pairing> = self.pairings.read().values().cloned().collect();
        out.sort_by(|a, b| a.topic.cmp(&b.topic));
        out
    }

    fn subscribe_events(&self) -> Subscription<PairingEvent> {
        self.events.subscribe()
    }
}

//! Relay messages to the component that owns them.

use shared_bus::Subscription;
use shared_types::{CancelSignal, JsonRpcPayload};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wc_03_relayer::{RelayMessage, RelayerEvent};
use wc_04_pairing::{is_pairing_method, PairingApi, PairingManager};
use wc_06_auth::AuthEngine;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Pairing,
    Auth,
    /// Not decryptable, not parseable, or nobody was waiting for it.
    Dropped,
}

/// Each message is handled on its own task. Per-topic and per-request locks
/// inside the components serialize state changes; a handler stuck on the
/// relay does not hold up unrelated messages.
#[derive(Clone)]
pub struct InboundRouter {
    pairing: Arc<PairingManager>,
    auth: Arc<AuthEngine>,
}

impl InboundRouter {
    pub fn new(pairing: Arc<PairingManager>, auth: Arc<AuthEngine>) -> Self {
        Self { pairing, auth }
    }

    /// Decrypt and dispatch one message. Failures are logged, never
    /// propagated.
    pub async fn route(&self, msg: RelayMessage) -> RouteOutcome {
        let payload = match self.pairing.decode(&msg.topic, &msg.message) {
            Ok(payload) => payload,
            Err(e) if e.is_decryption_failure() => {
                debug!(topic = %msg.topic.short(), "[runtime] undecryptable message dropped");
                return RouteOutcome::Dropped;
            }
            Err(e) => {
                warn!(topic = %msg.topic.short(), error = %e, "[runtime] inbound message dropped");
                return RouteOutcome::Dropped;
            }
        };

        match payload {
            JsonRpcPayload::Request(request) if is_pairing_method(&request.method) => {
                let method = request.method.clone();
                if let Err(e) = self.pairing.handle_request(&msg.topic, request).await {
                    warn!(topic = %msg.topic.short(), %method, error = %e, "[runtime] pairing request failed");
                }
                RouteOutcome::Pairing
            }
            JsonRpcPayload::Request(request) => {
                let (id, method) = (request.id, request.method.clone());
                match self.auth.handle_request(&msg.topic, request, &msg.message).await {
                    Ok(()) => RouteOutcome::Auth,
                    Err(e) => {
                        warn!(topic = %msg.topic.short(), id, %method, error = %e, "[runtime] auth request failed");
                        RouteOutcome::Dropped
                    }
                }
            }
            response => {
                if self.pairing.handle_response(&response) {
                    return RouteOutcome::Pairing;
                }
                let id = response.id();
                if self.auth.handle_response(&msg.topic, response).await {
                    RouteOutcome::Auth
                } else {
                    debug!(topic = %msg.topic.short(), id, "[runtime] unsolicited response dropped");
                    RouteOutcome::Dropped
                }
            }
        }
    }

    /// Route every relayer `Message` event until `shutdown` fires. Handlers
    /// still running at shutdown are aborted.
    pub async fn run(self, mut events: Subscription<RelayerEvent>, shutdown: CancelSignal) {
        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(RelayerEvent::Message(msg)) => {
                        let router = self.clone();
                        handlers.spawn(async move { router.route(msg).await });
                    }
                    Some(_) => {}
                    None => break,
                },
                Some(done) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = done {
                        warn!(error = %e, "[runtime] inbound handler failed");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        handlers.shutdown().await;
        info!("[runtime] inbound router stopped");
    }
}

//! # Auth Engine
//!
//! Both ends of `wc_authRequest`:
//!
//! ```text
//! requester                                   responder
//! ─────────                                   ─────────
//! request ─▶ history + expiry ─▶ publish ───▶ handle_request ─▶ Requested
//!                                                   │
//! handle_response ◀──────────────── publish ◀── respond
//!   ├─ verified   ─▶ activate ─▶ Responded         └─▶ activate (signed only)
//!   └─ otherwise  ─▶ Error
//! ```
//!
//! Inbound requests stay pending, in memory and under `auth:request:{id}`,
//! until answered or expired. Transitions on one request id take that id's
//! lock from [`KeyedLocks`].

use crate::domain::cacao::{
    Cacao, CacaoClaims, CacaoHeader, CacaoPayload, Issuer, CACAO_TYPE_EIP4361, CACAO_VERSION,
};
use crate::domain::config::AuthConfig;
use crate::domain::entities::{
    AuthEvent, AuthHistoryEntry, AuthRequest, AuthRequestParams, ErrorReason, PendingRequest,
    RequestParams, RequestUri, RespondParams,
};
use crate::domain::errors::AuthError;
use crate::domain::message::format_message;
use crate::domain::methods::AUTH_REQUEST;
use crate::domain::verification::verify_cacao;
use crate::ports::inbound::AuthApi;
use crate::ports::outbound::ContractSignatureVerifier;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use shared_bus::{EventBus, EventPublisher, KeyedLocks, Subscription};
use shared_types::{
    payload_id, scan_json, write_json, CancelSignal, JsonRpcError, JsonRpcPayload, JsonRpcRequest,
    JsonRpcResult, KeyValueStore, Participant, ResponseOutcome, RpcId, TimeSource, Topic,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wc_01_expirer::{ExpirerApi, ExpiryTarget};
use wc_02_history::{HistoryError, JsonRpcHistory, JsonRpcRecord};
use wc_04_pairing::{Pairing, PairingApi};
use wc_05_verify::{VerifyContext, VerifyContextResolver};
use wc_telemetry::log_topic_event;

/// Storage key prefix for pending inbound requests.
pub const STORAGE_PREFIX: &str = "auth:request:";

fn storage_key(id: RpcId) -> String {
    format!("{STORAGE_PREFIX}{id}")
}

struct Tracked {
    request: PendingRequest,
    verify_context: VerifyContext,
}

pub struct AuthEngine {
    config: AuthConfig,
    pairing: Arc<dyn PairingApi>,
    history: Arc<JsonRpcHistory>,
    expirer: Arc<dyn ExpirerApi>,
    verify: Arc<VerifyContextResolver>,
    contracts: Arc<dyn ContractSignatureVerifier>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    pending: RwLock<BTreeMap<RpcId, Tracked>>,
    locks: KeyedLocks<RpcId>,
    events: EventBus<AuthEvent>,
}

impl AuthEngine {
    /// Create the engine, restoring pending inbound requests. Their verify
    /// context is not persisted and comes back as `Unknown`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AuthConfig,
        pairing: Arc<dyn PairingApi>,
        history: Arc<JsonRpcHistory>,
        expirer: Arc<dyn ExpirerApi>,
        verify: Arc<VerifyContextResolver>,
        contracts: Arc<dyn ContractSignatureVerifier>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, AuthError> {
        let restored: Vec<PendingRequest> = scan_json(store.as_ref(), STORAGE_PREFIX)?;
        let mut pending = BTreeMap::new();
        for request in restored {
            let target = ExpiryTarget::Id(request.id);
            if !expirer.has(&target) {
                let expires_at = request.received_at.saturating_add(config.default_request_ttl);
                expirer.register_at(target, expires_at)?;
            }
            let origin = Some(request.params.requester.metadata.url.clone()).filter(|u| !u.is_empty());
            pending.insert(
                request.id,
                Tracked {
                    verify_context: VerifyContext::unknown(origin),
                    request,
                },
            );
        }
        if !pending.is_empty() {
            info!(pending = pending.len(), "[wc-06] restored pending auth requests");
        }

        Ok(Self {
            config,
            pairing,
            history,
            expirer,
            verify,
            contracts,
            store,
            clock,
            pending: RwLock::new(pending),
            locks: KeyedLocks::new(),
            events: EventBus::new(),
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn issued_at(&self) -> Result<String, AuthError> {
        let millis = i64::try_from(self.clock.now_millis())
            .map_err(|_| AuthError::Payload("clock out of range".into()))?;
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or_else(|| AuthError::Payload("clock out of range".into()))
    }

    fn build_payload(&self, params: &RequestParams) -> Result<CacaoPayload, AuthError> {
        Ok(CacaoPayload {
            kind: CACAO_TYPE_EIP4361.to_string(),
            chain_id: params.chain_id.clone(),
            domain: params.domain.clone(),
            aud: params.aud.clone(),
            version: CACAO_VERSION.to_string(),
            nonce: params.nonce.clone(),
            iat: self.issued_at()?,
            nbf: params.nbf.clone(),
            exp: params.exp.clone(),
            statement: params.statement.clone(),
            request_id: params.request_id.clone(),
            resources: params.resources.clone(),
        })
    }

    /// Reuse `topic` if it names a live pairing, else mint a new one.
    async fn pairing_for(&self, topic: Option<&Topic>) -> Result<(Topic, Option<String>), AuthError> {
        let now = self.clock.now_secs();
        if let Some(existing) = topic
            .and_then(|t| self.pairing.get(t))
            .filter(|p| !p.is_expired(now))
        {
            return Ok((existing.topic, None));
        }
        if let Some(topic) = topic {
            debug!(topic = %topic.short(), "[wc-06] requested pairing unknown or expired, creating new");
        }
        let created = self.pairing.create(None).await?;
        Ok((created.topic, created.uri))
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Handle a decrypted `wc_authRequest`. `ciphertext` is the message as
    /// published, used to look up its attestation.
    ///
    /// A redelivered request (id already in history) is dropped.
    pub async fn handle_request(
        &self,
        topic: &Topic,
        request: JsonRpcRequest,
        ciphertext: &str,
    ) -> Result<(), AuthError> {
        if request.method != AUTH_REQUEST.name {
            return Err(AuthError::Payload(format!("unsupported method {}", request.method)));
        }
        let params: AuthRequestParams = serde_json::from_value(request.params.clone())
            .map_err(|e| AuthError::Payload(e.to_string()))?;
        let id = request.id;

        let _guard = self.locks.lock(&id).await;
        match self
            .history
            .record_request(topic, &request, Some(params.payload_params.chain_id.clone()))
        {
            Ok(()) => {}
            Err(HistoryError::DuplicateId { .. }) => {
                debug!(id, topic = %topic.short(), "[wc-06] duplicate auth request dropped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let pending = PendingRequest {
            id,
            topic: topic.clone(),
            params: params.clone(),
            received_at: self.clock.now_secs(),
        };
        write_json(self.store.as_ref(), &storage_key(id), &pending)?;
        self.expirer
            .register(ExpiryTarget::Id(id), self.config.default_request_ttl)?;

        if let Err(e) = self
            .pairing
            .update_metadata(topic, params.requester.metadata.clone())
            .await
        {
            warn!(topic = %topic.short(), error = %e, "[wc-06] could not store requester metadata");
        }

        let origin = Some(params.requester.metadata.url.as_str()).filter(|u| !u.is_empty());
        let verify_context = self
            .verify
            .resolve(&VerifyContextResolver::attestation_id(ciphertext), origin)
            .await;

        self.pending.write().insert(
            id,
            Tracked {
                request: pending,
                verify_context: verify_context.clone(),
            },
        );

        log_topic_event!(
            info,
            "wc-06",
            "[wc-06] 📨 auth request received",
            topic.short(),
            id = id,
            validation = ?verify_context.validation
        );
        self.events.publish(AuthEvent::Requested(AuthRequest {
            id,
            topic: topic.clone(),
            params,
            verify_context,
        }));
        Ok(())
    }

    /// Handle a response on `topic`. Returns false if it does not answer an
    /// open auth request of ours on that topic.
    pub async fn handle_response(&self, topic: &Topic, payload: JsonRpcPayload) -> bool {
        let id = payload.id();
        let Some((_, outcome)) = payload.into_response() else {
            return false;
        };
        if !self.is_open_request(topic, id) {
            return false;
        }

        let guard = self.locks.lock(&id).await;
        let Some(record) = self.history.get(id).filter(|r| !r.is_resolved()) else {
            return true;
        };
        self.resolve_response(topic, &record, outcome).await;
        if let Err(e) = self.expirer.unregister(&ExpiryTarget::Id(id)) {
            warn!(id, error = %e, "[wc-06] failed to unregister request expiry");
        }
        drop(guard);
        self.locks.forget(&id);
        true
    }

    fn is_open_request(&self, topic: &Topic, id: RpcId) -> bool {
        self.history.get(id).is_some_and(|r| {
            &r.topic == topic && r.method() == AUTH_REQUEST.name && !r.is_resolved()
        })
    }

    async fn resolve_response(&self, topic: &Topic, record: &JsonRpcRecord, outcome: ResponseOutcome) {
        let id = record.id;
        if let Err(e) = self.history.record_response(topic, id, outcome.clone()) {
            warn!(id, error = %e, "[wc-06] failed to record auth response");
            return;
        }

        let value = match outcome {
            ResponseOutcome::Error(error) => {
                log_topic_event!(info, "wc-06", "[wc-06] auth request rejected by peer", topic.short(), id = id, code = error.code);
                self.emit_error(id, topic, ErrorReason::Peer(error));
                return;
            }
            ResponseOutcome::Result(value) => value,
        };

        let cacao: Cacao = match serde_json::from_value(value) {
            Ok(cacao) => cacao,
            Err(e) => {
                warn!(id, error = %e, "[wc-06] auth response is not a CACAO");
                self.emit_error(id, topic, ErrorReason::MalformedResponse(e.to_string()));
                return;
            }
        };
        let requested: AuthRequestParams = match serde_json::from_value(record.request.params.clone()) {
            Ok(params) => params,
            Err(e) => {
                self.emit_error(id, topic, ErrorReason::MalformedResponse(e.to_string()));
                return;
            }
        };

        if let Err(e) = verify_cacao(&cacao, &requested.payload_params, self.contracts.as_ref()).await {
            warn!(id, topic = %topic.short(), error = %e, "[wc-06] ❌ CACAO verification failed");
            self.emit_error(id, topic, ErrorReason::InvalidSignature(e.to_string()));
            return;
        }

        if let Err(e) = self.pairing.activate(topic).await {
            warn!(topic = %topic.short(), error = %e, "[wc-06] could not activate pairing");
        }
        log_topic_event!(info, "wc-06", "[wc-06] ✅ auth response verified", topic.short(), id = id, iss = %cacao.p.iss);
        self.events.publish(AuthEvent::Responded {
            id,
            topic: topic.clone(),
            cacao,
        });
    }

    fn emit_error(&self, id: RpcId, topic: &Topic, reason: ErrorReason) {
        self.events.publish(AuthEvent::Error {
            id,
            topic: topic.clone(),
            reason,
        });
    }

    /// React to an expirer notification. Drops an unanswered inbound
    /// request; history keeps its record.
    pub async fn on_expired(&self, target: &ExpiryTarget) {
        let ExpiryTarget::Id(id) = target else {
            return;
        };
        let guard = self.locks.lock(id).await;
        if self.forget_pending(*id).is_some() {
            info!(id, "[wc-06] ⏰ pending auth request expired");
        } else if self.history.get(*id).is_some_and(|r| !r.is_resolved()) {
            debug!(id, "[wc-06] ⏰ auth request expired unanswered");
        }
        drop(guard);
        self.locks.forget(id);
    }

    /// Remove a pending request from memory and storage. Caller holds the
    /// id lock.
    fn forget_pending(&self, id: RpcId) -> Option<PendingRequest> {
        let removed = self.pending.write().remove(&id)?;
        if let Err(e) = self.store.delete(&storage_key(id)) {
            warn!(id, error = %e, "[wc-06] failed to delete pending request");
        }
        Some(removed.request)
    }
}

#[async_trait]
impl AuthApi for AuthEngine {
    async fn request(
        &self,
        params: RequestParams,
        pairing_topic: Option<&Topic>,
        cancel: CancelSignal,
    ) -> Result<RequestUri, AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        let ttl = params.expiry.unwrap_or(self.config.default_request_ttl);
        let (topic, uri) = tokio::select! {
            r = self.pairing_for(pairing_topic) => r?,
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
        };

        let body = AuthRequestParams {
            payload_params: self.build_payload(&params)?,
            requester: Participant {
                public_key: None,
                metadata: self.config.metadata.clone(),
            },
        };
        let value = serde_json::to_value(&body).map_err(|e| AuthError::Payload(e.to_string()))?;
        let request = JsonRpcRequest::with_id(payload_id(), AUTH_REQUEST.name, value);
        let id = request.id;

        self.history
            .record_request(&topic, &request, Some(params.chain_id.clone()))?;
        self.expirer.register(ExpiryTarget::Id(id), ttl)?;

        let opts = AUTH_REQUEST.request.with_ttl(ttl);
        let payload = JsonRpcPayload::from(request);
        tokio::select! {
            r = self.pairing.send(&topic, &payload, opts) => r?,
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
        }

        log_topic_event!(info, "wc-06", "[wc-06] 📤 auth request sent", topic.short(), id = id, ttl = ttl, reused = uri.is_none());
        Ok(RequestUri { uri, id, topic })
    }

    async fn respond(
        &self,
        params: RespondParams,
        iss: &str,
        cancel: CancelSignal,
    ) -> Result<(), AuthError> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        let id = params.id();
        let guard = self.locks.lock(&id).await;
        let pending = self
            .pending
            .read()
            .get(&id)
            .map(|t| t.request.clone())
            .ok_or(AuthError::RequestNotFound(id))?;
        let topic = pending.topic.clone();

        let (payload, outcome, signed) = match params {
            RespondParams::Result { signature, .. } => {
                Issuer::parse(iss)?;
                let cacao = Cacao {
                    h: CacaoHeader::default(),
                    p: CacaoClaims::new(&pending.params.payload_params, iss),
                    s: signature,
                };
                let value = serde_json::to_value(&cacao).map_err(|e| AuthError::Payload(e.to_string()))?;
                (
                    JsonRpcPayload::from(JsonRpcResult::new(id, value.clone())),
                    ResponseOutcome::Result(value),
                    true,
                )
            }
            RespondParams::Error { error, .. } => (
                JsonRpcPayload::from(JsonRpcError::new(id, error.clone())),
                ResponseOutcome::Error(error),
                false,
            ),
        };

        // Nothing is recorded until the response is out; a cancelled
        // respond leaves the request pending.
        tokio::select! {
            r = self.pairing.send(&topic, &payload, AUTH_REQUEST.response) => r?,
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
        }
        self.history.record_response(&topic, id, outcome)?;
        self.forget_pending(id);
        if let Err(e) = self.expirer.unregister(&ExpiryTarget::Id(id)) {
            warn!(id, error = %e, "[wc-06] failed to unregister request expiry");
        }
        drop(guard);
        self.locks.forget(&id);

        if signed {
            self.pairing.activate(&topic).await?;
        }
        log_topic_event!(info, "wc-06", "[wc-06] auth response sent", topic.short(), id = id, signed = signed);
        Ok(())
    }

    fn format_message(&self, payload: &CacaoPayload, iss: &str) -> Result<String, AuthError> {
        format_message(payload, iss)
    }

    fn pending_requests(&self) -> HashMap<RpcId, PendingRequest> {
        self.pending
            .read()
            .iter()
            .map(|(id, t)| (*id, t.request.clone()))
            .collect()
    }

    fn requests(&self) -> Vec<AuthRequest> {
        self.pending
            .read()
            .values()
            .map(|t| AuthRequest {
                id: t.request.id,
                topic: t.request.topic.clone(),
                params: t.request.params.clone(),
                verify_context: t.verify_context.clone(),
            })
            .collect()
    }

    fn auth_history(&self) -> Vec<AuthHistoryEntry> {
        self.history.query_by_type::<AuthRequestParams, Cacao>()
    }

    fn pairings(&self) -> Vec<Pairing> {
        self.pairing.pairings()
    }

    fn subscribe_events(&self) -> Subscription<AuthEvent> {
        self.events.subscribe()
    }
}

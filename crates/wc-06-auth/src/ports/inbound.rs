//! # Inbound Ports (Driving Ports / API)

use crate::domain::cacao::CacaoPayload;
use crate::domain::entities::{
    AuthEvent, AuthHistoryEntry, AuthRequest, PendingRequest, RequestParams, RequestUri,
    RespondParams,
};
use crate::domain::errors::AuthError;
use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::{CancelSignal, RpcId, Topic};
use std::collections::HashMap;
use wc_04_pairing::Pairing;

/// Sign-in requests over pairings, from both ends.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Send an auth request. Reuses `pairing_topic` when it names a known,
    /// unexpired pairing; otherwise creates a new pairing and returns its
    /// URI.
    ///
    /// Cancelling leaves the history record in place so a late response
    /// still resolves it.
    async fn request(
        &self,
        params: RequestParams,
        pairing_topic: Option<&Topic>,
        cancel: CancelSignal,
    ) -> Result<RequestUri, AuthError>;

    /// Answer a pending inbound request with a signature or an error.
    ///
    /// # Errors
    ///
    /// `RequestNotFound` if `id` has no pending request. `Cancelled` if
    /// `cancel` fires before the response is sent; the request then stays
    /// pending.
    async fn respond(
        &self,
        params: RespondParams,
        iss: &str,
        cancel: CancelSignal,
    ) -> Result<(), AuthError>;

    /// Render the message a wallet signs for `payload` as `iss`.
    fn format_message(&self, payload: &CacaoPayload, iss: &str) -> Result<String, AuthError>;

    /// Inbound requests awaiting `respond`, by id.
    fn pending_requests(&self) -> HashMap<RpcId, PendingRequest>;

    /// Inbound requests awaiting `respond`, oldest first, with their verify
    /// context.
    fn requests(&self) -> Vec<AuthRequest>;

    /// Resolved auth exchanges from history.
    fn auth_history(&self) -> Vec<AuthHistoryEntry>;

    /// Every pairing the client knows, any state.
    fn pairings(&self) -> Vec<Pairing>;

    fn subscribe_events(&self) -> Subscription<AuthEvent>;
}

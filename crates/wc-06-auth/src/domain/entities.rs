//! # Auth Entities

use super::cacao::{Cacao, CacaoPayload, CacaoSignature};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shared_types::{ErrorPayload, Participant, RpcId, Topic};
use wc_02_history::{RequestShape, TypedRecord};
use wc_05_verify::VerifyContext;

/// What the application asks a wallet to sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    pub domain: String,
    pub aud: String,
    /// CAIP-2 chain id, e.g. `eip155:1`.
    pub chain_id: String,
    pub nonce: String,
    pub statement: Option<String>,
    pub resources: Option<Vec<String>>,
    /// Request lifetime in seconds. Also the relay TTL of the request.
    pub expiry: Option<u64>,
    pub exp: Option<String>,
    pub nbf: Option<String>,
    pub request_id: Option<String>,
}

/// Params of `wc_authRequest` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequestParams {
    pub payload_params: CacaoPayload,
    pub requester: Participant,
}

impl RequestShape for AuthRequestParams {
    const METHOD: &'static str = super::methods::AUTH_REQUEST.name;
}

/// Result of [`request`](crate::AuthApi::request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri {
    /// Pairing URI to hand to the wallet. `None` when an existing pairing
    /// was reused: the peer is already listening.
    pub uri: Option<String>,
    pub id: RpcId,
    pub topic: Topic,
}

/// An inbound request awaiting `respond`. Persisted under
/// `auth:request:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: RpcId,
    pub topic: Topic,
    pub params: AuthRequestParams,
    /// Unix seconds.
    pub received_at: u64,
}

/// Delivered to the application with [`AuthEvent::Requested`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub id: RpcId,
    pub topic: Topic,
    pub params: AuthRequestParams,
    pub verify_context: VerifyContext,
}

/// The wallet's answer to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondParams {
    Result { id: RpcId, signature: CacaoSignature },
    Error { id: RpcId, error: ErrorPayload },
}

impl RespondParams {
    pub fn id(&self) -> RpcId {
        match self {
            Self::Result { id, .. } | Self::Error { id, .. } => *id,
        }
    }
}

/// Why a request ended without a verified CACAO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReason {
    /// The wallet answered with a JSON-RPC error.
    Peer(ErrorPayload),
    /// The CACAO did not verify.
    InvalidSignature(String),
    /// The result could not be decoded as a CACAO.
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Responder side: a new request arrived.
    Requested(AuthRequest),
    /// Requester side: verified CACAO received.
    Responded { id: RpcId, topic: Topic, cacao: Cacao },
    /// Requester side: the request failed.
    Error {
        id: RpcId,
        topic: Topic,
        reason: ErrorReason,
    },
}

impl AuthEvent {
    pub fn id(&self) -> RpcId {
        match self {
            Self::Requested(req) => req.id,
            Self::Responded { id, .. } | Self::Error { id, .. } => *id,
        }
    }

    pub fn topic(&self) -> &Topic {
        match self {
            Self::Requested(req) => &req.topic,
            Self::Responded { topic, .. } | Self::Error { topic, .. } => topic,
        }
    }
}

/// Resolved `wc_authRequest` exchange.
pub type AuthHistoryEntry = TypedRecord<AuthRequestParams, Cacao>;

/// Random alphanumeric nonce for [`RequestParams::nonce`].
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

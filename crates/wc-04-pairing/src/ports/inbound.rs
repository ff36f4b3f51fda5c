//! # Inbound Ports (Driving Ports / API)

use crate::domain::entities::{Pairing, PairingEvent};
use crate::domain::errors::PairingError;
use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::{CancelSignal, JsonRpcPayload, Metadata, Topic};
use std::time::Duration;
use wc_03_relayer::PublishOptions;

/// Pairing lifecycle plus encrypted messaging over pairing topics.
///
/// Operations on one topic are serialized; different topics proceed in
/// parallel.
#[async_trait]
pub trait PairingApi: Send + Sync {
    /// Mint a pairing with a fresh key. `expiry_secs` overrides the default
    /// proposal lifetime.
    async fn create(&self, expiry_secs: Option<u64>) -> Result<Pairing, PairingError>;

    /// Join the pairing described by `uri`. Cancelling, or dropping the
    /// future, leaves no record, expiry entry or subscription behind.
    async fn pair(&self, uri: &str, cancel: CancelSignal) -> Result<Pairing, PairingError>;

    /// Mark the pairing active and extend its lifetime. Idempotent.
    async fn activate(&self, topic: &Topic) -> Result<(), PairingError>;

    async fn update_metadata(&self, topic: &Topic, metadata: Metadata) -> Result<(), PairingError>;

    /// Round-trip a ping to the peer. `timeout` defaults to the configured
    /// ping timeout.
    async fn ping(
        &self,
        topic: &Topic,
        timeout: Option<Duration>,
        cancel: CancelSignal,
    ) -> Result<(), PairingError>;

    /// Tell the peer, then forget the pairing locally.
    async fn disconnect(&self, topic: &Topic) -> Result<(), PairingError>;

    /// Encrypt `payload` with the pairing's key and publish it on `topic`.
    async fn send(
        &self,
        topic: &Topic,
        payload: &JsonRpcPayload,
        opts: PublishOptions,
    ) -> Result<(), PairingError>;

    /// Decrypt and parse a ciphertext received on `topic`.
    fn decode(&self, topic: &Topic, ciphertext: &str) -> Result<JsonRpcPayload, PairingError>;

    fn get(&self, topic: &Topic) -> Option<Pairing>;

    /// Every known pairing, any state.
    fn pairings(&self) -> Vec<Pairing>;

    fn subscribe_events(&self) -> Subscription<PairingEvent>;
}

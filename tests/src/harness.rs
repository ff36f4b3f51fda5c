//! Shared fixtures for the two-peer flows.

use anyhow::{anyhow, bail, Result};
use client_runtime::{ClientConfig, ClientRuntime, ComponentsBuilder};
use shared_bus::Subscription;
use shared_crypto::{format_address, Secp256k1KeyPair};
use shared_types::{CancelSignal, KeyValueStore, Metadata, RpcId};
use std::sync::Arc;
use std::time::Duration;
use wc_03_relayer::InMemoryRelay;
use wc_06_auth::{AuthApi, AuthEvent, AuthRequest, CacaoSignature, RequestParams, RespondParams};

/// Upper bound for any single step of a flow.
pub const STEP: Duration = Duration::from_secs(5);

pub fn metadata(name: &str) -> Metadata {
    Metadata::new(name, format!("{name} test client"), format!("https://{name}.example"))
}

/// A started client named `name`, connected to `hub`.
pub async fn client(hub: &InMemoryRelay, name: &str) -> Result<ClientRuntime> {
    client_with(hub, name, ComponentsBuilder::new()).await
}

/// Like [`client`] but persisting to `store`.
pub async fn client_with_store(
    hub: &InMemoryRelay,
    name: &str,
    store: Arc<dyn KeyValueStore>,
) -> Result<ClientRuntime> {
    client_with(hub, name, ComponentsBuilder::new().store(store)).await
}

async fn client_with(hub: &InMemoryRelay, name: &str, builder: ComponentsBuilder) -> Result<ClientRuntime> {
    let mut config = ClientConfig::default();
    config.auth.metadata = metadata(name);
    let runtime = ClientRuntime::new(config, builder.transport(Arc::new(hub.transport())))?;
    runtime.start().await?;
    runtime.wait_ready(STEP).await?;
    Ok(runtime)
}

pub fn request_params() -> RequestParams {
    RequestParams {
        domain: "app.example".into(),
        aud: "https://app.example/login".into(),
        chain_id: "eip155:1".into(),
        nonce: wc_06_auth::generate_nonce(),
        statement: Some("Sign in to app.example".into()),
        resources: Some(vec!["ipfs://bafybeiemxf5abjwjbikoz4mc3a3dla6ual3jsgpdr4cjr3oz3evfyavhwq".into()]),
        ..RequestParams::default()
    }
}

pub fn iss(key: &Secp256k1KeyPair) -> String {
    format!("did:pkh:eip155:1:{}", format_address(&key.address()))
}

/// Next `Requested` event on `events`.
pub async fn next_request(events: &mut Subscription<AuthEvent>) -> Result<AuthRequest> {
    match events
        .recv_matching(STEP, |e| matches!(e, AuthEvent::Requested(_)))
        .await
        .ok()
    {
        Some(AuthEvent::Requested(request)) => Ok(request),
        _ => bail!("no auth request arrived"),
    }
}

/// First `Responded` or `Error` event for `id`.
pub async fn outcome(events: &mut Subscription<AuthEvent>, id: RpcId) -> Result<AuthEvent> {
    events
        .recv_matching(STEP, |e| {
            e.id() == id && matches!(e, AuthEvent::Responded { .. } | AuthEvent::Error { .. })
        })
        .await
        .ok()
        .ok_or_else(|| anyhow!("no outcome for request {id}"))
}

/// Sign the request's message with `key` and send it back.
pub async fn sign_and_respond(wallet: &ClientRuntime, key: &Secp256k1KeyPair, request: &AuthRequest) -> Result<()> {
    let iss = iss(key);
    let message = wallet.auth().format_message(&request.params.payload_params, &iss)?;
    let signature = key.sign_personal(message.as_bytes())?;
    wallet
        .auth()
        .respond(
            RespondParams::Result {
                id: request.id,
                signature: CacaoSignature::eip191(signature),
            },
            &iss,
            CancelSignal::never(),
        )
        .await?;
    Ok(())
}

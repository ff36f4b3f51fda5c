//! # wc-demo
//!
//! Runs a complete sign-in between two in-process clients sharing an
//! in-memory relay:
//!
//! 1. The app client sends `wc_authRequest` and prints the pairing URI
//! 2. The wallet client pairs with the URI and receives the request
//! 3. The wallet signs the EIP-4361 message with a throwaway key
//! 4. The app verifies the signature and both pairings become active

use anyhow::{bail, Context, Result};
use client_runtime::{ClientConfig, ClientRuntime, ComponentsBuilder};
use shared_crypto::{format_address, Secp256k1KeyPair};
use shared_types::CancelSignal;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wc_03_relayer::InMemoryRelay;
use wc_04_pairing::PairingApi;
use wc_06_auth::{generate_nonce, AuthApi, AuthEvent, CacaoSignature, RequestParams, RespondParams};
use wc_telemetry::{init_logging, TelemetryConfig};

const STEP_TIMEOUT: Duration = Duration::from_secs(10);

async fn client(hub: &InMemoryRelay, config: &ClientConfig) -> Result<ClientRuntime> {
    let runtime = ClientRuntime::new(
        config.clone(),
        ComponentsBuilder::new().transport(Arc::new(hub.transport())),
    )?;
    runtime.start().await?;
    runtime.wait_ready(STEP_TIMEOUT).await?;
    Ok(runtime)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env().context("invalid configuration")?;
    init_logging(&TelemetryConfig {
        service_name: "wc-demo".to_string(),
        ..config.telemetry.clone()
    })?;

    let hub = InMemoryRelay::new();
    let app = client(&hub, &config).await?;
    let wallet = client(&hub, &config).await?;
    let mut app_events = app.auth().subscribe_events();
    let mut wallet_events = wallet.auth().subscribe_events();

    let sent = app
        .auth()
        .request(
            RequestParams {
                domain: "localhost".into(),
                aud: "http://localhost:3000/login".into(),
                chain_id: "eip155:1".into(),
                nonce: generate_nonce(),
                statement: Some("Sign in to the demo".into()),
                ..RequestParams::default()
            },
            None,
            CancelSignal::never(),
        )
        .await?;
    let Some(uri) = sent.uri else {
        bail!("new pairing produced no URI");
    };
    info!(id = sent.id, %uri, "[demo] auth request sent");

    wallet.pairing().pair(&uri, CancelSignal::never()).await?;
    let request = match wallet_events
        .recv_matching(STEP_TIMEOUT, |e| matches!(e, AuthEvent::Requested(_)))
        .await
        .ok()
    {
        Some(AuthEvent::Requested(request)) => request,
        _ => bail!("wallet never received the request"),
    };
    info!(id = request.id, verified = ?request.verify_context.validation, "[demo] wallet received request");

    let key = Secp256k1KeyPair::generate();
    let iss = format!("did:pkh:eip155:1:{}", format_address(&key.address()));
    let message = wallet.auth().format_message(&request.params.payload_params, &iss)?;
    println!("{message}\n");
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

    match app_events
        .recv_matching(STEP_TIMEOUT, |e| e.id() == sent.id)
        .await
        .ok()
    {
        Some(AuthEvent::Responded { cacao, .. }) => {
            info!(iss = %cacao.p.iss, "[demo] ✅ signed in");
        }
        Some(AuthEvent::Error { reason, .. }) => bail!("sign-in failed: {reason:?}"),
        _ => bail!("no response before timeout"),
    }

    info!(
        app_active = app.pairing().is_active(&sent.topic),
        wallet_active = wallet.pairing().is_active(&sent.topic),
        "[demo] pairing state"
    );

    app.shutdown().await;
    wallet.shutdown().await;
    Ok(())
}

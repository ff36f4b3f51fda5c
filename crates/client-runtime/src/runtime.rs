//! # Client Runtime
//!
//! ## Startup Sequence
//!
//! 1. Build components (restoring persisted state)
//! 2. Attach the inbound and expiry routers
//! 3. Start the relayer connection loop and the expiry sweeper
//! 4. Resubscribe every restored pairing topic
//!
//! ## Shutdown Sequence
//!
//! 1. Fire the shutdown signal
//! 2. Wait (bounded) for the background tasks to finish

use crate::container::{ClientConfig, Components, ComponentsBuilder, RuntimeError};
use crate::wiring::{ExpiryRouter, InboundRouter};
use parking_lot::Mutex;
use shared_types::{cancel_pair, CancelHandle, CancelSignal, KeyValueStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wc_01_expirer::{Expirer, ExpirerApi};
use wc_02_history::JsonRpcHistory;
use wc_03_relayer::{Relayer, RelayerApi};
use wc_04_pairing::{PairingApi, PairingManager};
use wc_06_auth::AuthEngine;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct ClientRuntime {
    config: ClientConfig,
    components: Components,
    shutdown_tx: CancelHandle,
    shutdown_rx: CancelSignal,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ClientRuntime {
    /// Build every component. Nothing runs until [`start`](Self::start).
    pub fn new(config: ClientConfig, builder: ComponentsBuilder) -> Result<Self, RuntimeError> {
        let components = builder.build(&config)?;
        let (shutdown_tx, shutdown_rx) = cancel_pair();
        Ok(Self {
            config,
            components,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Start background work. A second call is a no-op.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let c = &self.components;

        // Subscribe before anything can publish so no event is missed.
        let relay_events = c.relayer.subscribe_events();
        let expiry_events = c.expirer.subscribe();

        let inbound = InboundRouter::new(c.pairing.clone(), c.auth.clone());
        let expiry = ExpiryRouter::new(c.pairing.clone(), c.auth.clone());
        let mut tasks = vec![
            tokio::spawn(inbound.run(relay_events, self.shutdown_rx.clone())),
            tokio::spawn(expiry.run(expiry_events, self.shutdown_rx.clone())),
            c.relayer.start(self.shutdown_rx.clone()),
            c.expirer
                .clone()
                .spawn_sweeper(self.config.expirer.sweep_interval, self.shutdown_rx.clone()),
        ];
        self.tasks.lock().append(&mut tasks);

        c.pairing.resubscribe_all().await;
        info!(
            relay = %self.config.relayer.relay_url,
            pairings = c.pairing.pairings().len(),
            "[runtime] client started"
        );
        Ok(())
    }

    /// Wait until the relay connection is up.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), RuntimeError> {
        self.components.relayer.wait_connected(timeout).await?;
        Ok(())
    }

    /// Stop background tasks, waiting briefly for them to finish.
    pub async fn shutdown(&self) {
        info!("[runtime] shutting down");
        self.shutdown_tx.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "[runtime] task ended abnormally"),
                Err(_) => warn!("[runtime] task did not stop in time"),
            }
        }
        info!("[runtime] shutdown complete");
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> Arc<AuthEngine> {
        Arc::clone(&self.components.auth)
    }

    pub fn pairing(&self) -> Arc<PairingManager> {
        Arc::clone(&self.components.pairing)
    }

    pub fn relayer(&self) -> Arc<Relayer> {
        Arc::clone(&self.components.relayer)
    }

    pub fn history(&self) -> Arc<JsonRpcHistory> {
        Arc::clone(&self.components.history)
    }

    pub fn expirer(&self) -> Arc<Expirer> {
        Arc::clone(&self.components.expirer)
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.components.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared_types::{FileBackedKVStore, ManualTimeSource, Topic};
    use tokio::sync::mpsc;
    use wc_03_relayer::{
        InMemoryRelay, PublishOptions, RelayMessage, RelaySession, RelayTransport, RelayerError,
        RelayerEvent, TransportConnection,
    };
    use wc_04_pairing::PairingEvent;

    const WAIT: Duration = Duration::from_secs(5);

    async fn started(hub: &InMemoryRelay, builder: ComponentsBuilder) -> ClientRuntime {
        let runtime = ClientRuntime::new(
            ClientConfig::default(),
            builder.transport(Arc::new(hub.transport())),
        )
        .unwrap();
        runtime.start().await.unwrap();
        runtime.wait_ready(WAIT).await.unwrap();
        runtime
    }

    /// Delivers whatever the test hands it; never completes a publish.
    #[derive(Default)]
    struct ManualTransport {
        inbound: Mutex<Option<mpsc::UnboundedSender<RelayMessage>>>,
    }

    impl ManualTransport {
        fn deliver(&self, msg: RelayMessage) {
            if let Some(tx) = self.inbound.lock().as_ref() {
                let _ = tx.send(msg);
            }
        }
    }

    struct StalledSession;

    #[async_trait]
    impl RelayTransport for ManualTransport {
        async fn connect(&self) -> Result<TransportConnection, RelayerError> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.inbound.lock() = Some(tx);
            Ok(TransportConnection {
                inbound: rx,
                session: Arc::new(StalledSession),
            })
        }
    }

    #[async_trait]
    impl RelaySession for StalledSession {
        async fn publish(&self, _: &Topic, _: &str, _: PublishOptions) -> Result<(), RelayerError> {
            std::future::pending().await
        }

        async fn subscribe(&self, topic: &Topic) -> Result<String, RelayerError> {
            Ok(format!("sub-{}", topic.short()))
        }

        async fn unsubscribe(&self, _: &Topic, _: &str) -> Result<(), RelayerError> {
            Ok(())
        }
    }

    #[cfg(not(feature = "websocket"))]
    #[test]
    fn test_build_without_transport_fails() {
        let result = ClientRuntime::new(ClientConfig::default(), ComponentsBuilder::new());
        assert!(matches!(result, Err(RuntimeError::MissingTransport)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.auth.default_request_ttl = 0;
        let result = ClientRuntime::new(
            config,
            ComponentsBuilder::new().transport(Arc::new(InMemoryRelay::new().transport())),
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_ping_routes_between_runtimes() {
        let hub = InMemoryRelay::new();
        let a = started(&hub, ComponentsBuilder::new()).await;
        let b = started(&hub, ComponentsBuilder::new()).await;

        let pairing = a.pairing().create(None).await.unwrap();
        b.pairing().pair(pairing.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let mut b_events = b.pairing().subscribe_events();

        a.pairing()
            .ping(&pairing.topic, Some(WAIT), CancelSignal::never())
            .await
            .unwrap();
        b_events
            .recv_matching(WAIT, |e| matches!(e, PairingEvent::Ping { .. }))
            .await
            .unwrap();

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_stuck_handler_does_not_block_other_messages() {
        let hub = InMemoryRelay::new();
        let a = started(&hub, ComponentsBuilder::new()).await;
        let transport = Arc::new(ManualTransport::default());
        let b = ClientRuntime::new(
            ClientConfig::default(),
            ComponentsBuilder::new().transport(transport.clone()),
        )
        .unwrap();
        b.start().await.unwrap();
        b.wait_ready(WAIT).await.unwrap();
        let mut b_events = b.pairing().subscribe_events();
        let mut a_relay = a.relayer().subscribe_events();

        let mut pings = Vec::new();
        for _ in 0..2 {
            let pairing = a.pairing().create(None).await.unwrap();
            b.pairing()
                .pair(pairing.uri.as_deref().unwrap(), CancelSignal::never())
                .await
                .unwrap();
            let _ = a
                .pairing()
                .ping(&pairing.topic, Some(Duration::from_millis(50)), CancelSignal::never())
                .await;
            let event = a_relay
                .recv_matching(WAIT, |e| matches!(e, RelayerEvent::Publish { .. }))
                .await
                .unwrap();
            let RelayerEvent::Publish { topic, message, .. } = event else { unreachable!() };
            pings.push(RelayMessage::new(topic, message));
        }

        // The first ping's reply never leaves; the second must still land.
        for ping in pings {
            transport.deliver(ping);
        }
        for _ in 0..2 {
            b_events
                .recv_matching(WAIT, |e| matches!(e, PairingEvent::Ping { .. }))
                .await
                .unwrap();
        }

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_undecryptable_message_is_dropped() {
        let hub = InMemoryRelay::new();
        let a = started(&hub, ComponentsBuilder::new()).await;
        let pairing = a.pairing().create(None).await.unwrap();

        let router = InboundRouter::new(a.pairing(), a.auth());
        let outcome = router
            .route(wc_03_relayer::RelayMessage::new(pairing.topic.clone(), "AAAA"))
            .await;
        assert_eq!(outcome, crate::wiring::RouteOutcome::Dropped);
        assert!(a.pairing().get(&pairing.topic).is_some());
    }

    #[tokio::test]
    async fn test_expired_pairing_is_removed_by_sweeper() {
        let hub = InMemoryRelay::new();
        let clock = Arc::new(ManualTimeSource::at_secs(1_700_000_000));
        let mut config = ClientConfig::default();
        config.expirer.sweep_interval = Duration::from_millis(20);
        let runtime = ClientRuntime::new(
            config,
            ComponentsBuilder::new()
                .transport(Arc::new(hub.transport()))
                .clock(clock.clone()),
        )
        .unwrap();
        runtime.start().await.unwrap();
        let mut events = runtime.pairing().subscribe_events();

        let pairing = runtime.pairing().create(None).await.unwrap();
        clock.advance_secs(301);

        events
            .recv_matching(WAIT, |e| matches!(e, PairingEvent::Expire { .. }))
            .await
            .unwrap();
        assert!(runtime.pairing().get(&pairing.topic).is_none());
        assert!(!runtime.expirer().has(&wc_01_expirer::ExpiryTarget::Topic(pairing.topic)));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_restores_and_resubscribes() {
        let dir = tempfile::tempdir().unwrap();
        let hub = InMemoryRelay::new();
        let mut config = ClientConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let first = ClientRuntime::new(
            config.clone(),
            ComponentsBuilder::new().transport(Arc::new(hub.transport())),
        )
        .unwrap();
        first.start().await.unwrap();
        first.wait_ready(WAIT).await.unwrap();
        let pairing = first.pairing().create(None).await.unwrap();
        first.shutdown().await;
        drop(first);

        assert!(FileBackedKVStore::open(config.storage.store_path().unwrap()).is_ok());

        let second = ClientRuntime::new(
            config,
            ComponentsBuilder::new().transport(Arc::new(hub.transport())),
        )
        .unwrap();
        second.start().await.unwrap();
        second.wait_ready(WAIT).await.unwrap();

        assert!(second.pairing().get(&pairing.topic).is_some());
        assert!(second.relayer().topics().contains(&pairing.topic));
        second.shutdown().await;
    }
}

//! # Relayer Service
//!
//! Owns one logical relay connection and keeps it alive.
//!
//! ## Connection loop
//!
//! ```text
//! connect ──ok──▶ restore subscriptions ──▶ flush queue ──▶ pump inbound
//!    ▲                                                          │
//!    └──── backoff (base * 2^n, capped) ◀──── stream ended ◀────┘
//! ```
//!
//! The link (session + publish queue) sits behind one async mutex. The
//! connect path holds it while restoring and flushing, so a publish issued
//! during reconnection either lands in the queue before the flush or sees
//! the fresh session after it. Ordering within a topic is preserved.

use crate::domain::backoff::{calculate_backoff_delay, should_retry};
use crate::domain::config::RelayerConfig;
use crate::domain::entities::{
    DisconnectedPolicy, PublishOptions, RelayMessage, RelayerEvent, SubscriptionHandle,
};
use crate::domain::errors::RelayerError;
use crate::ports::inbound::RelayerApi;
use crate::ports::outbound::{RelaySession, RelayTransport, TransportConnection};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EventBus, EventPublisher, Subscription, TimeBoundedMessageCache};
use shared_crypto::sha256;
use shared_types::{CancelSignal, Topic};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct TopicSubscription {
    handle: SubscriptionHandle,
    /// Id assigned by the relay on the current connection.
    relay_id: Option<String>,
}

struct QueuedPublish {
    topic: Topic,
    message: String,
    opts: PublishOptions,
}

#[derive(Default)]
struct Link {
    session: Option<Arc<dyn RelaySession>>,
    queue: VecDeque<QueuedPublish>,
}

pub struct Relayer {
    config: RelayerConfig,
    transport: Arc<dyn RelayTransport>,
    link: tokio::sync::Mutex<Link>,
    topics: RwLock<HashMap<Topic, TopicSubscription>>,
    seen: Mutex<TimeBoundedMessageCache>,
    connected: watch::Sender<bool>,
    events: EventBus<RelayerEvent>,
    next_handle: AtomicU64,
}

impl Relayer {
    pub fn new(config: RelayerConfig, transport: Arc<dyn RelayTransport>) -> Self {
        Self::with_message_cache(config, transport, TimeBoundedMessageCache::new())
    }

    pub fn with_message_cache(
        config: RelayerConfig,
        transport: Arc<dyn RelayTransport>,
        cache: TimeBoundedMessageCache,
    ) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            config,
            transport,
            link: tokio::sync::Mutex::new(Link::default()),
            topics: RwLock::new(HashMap::new()),
            seen: Mutex::new(cache),
            connected,
            events: EventBus::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }

    /// Topics with a live or pending subscription.
    pub fn topics(&self) -> Vec<Topic> {
        self.topics.read().keys().cloned().collect()
    }

    /// Publishes waiting for a connection.
    pub async fn queued(&self) -> usize {
        self.link.lock().await.queue.len()
    }

    /// Spawn the connection loop. It runs until `shutdown` fires or the
    /// reconnect attempts run out.
    pub fn start(self: &Arc<Self>, shutdown: CancelSignal) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.connection_loop(shutdown).await })
    }

    async fn connection_loop(&self, shutdown: CancelSignal) {
        let mut attempts = 0u32;

        loop {
            let connect = tokio::time::timeout(self.config.connect_timeout, self.transport.connect());
            let outcome = tokio::select! {
                r = connect => r,
                _ = shutdown.cancelled() => break,
            };

            match outcome {
                Ok(Ok(conn)) => {
                    attempts = 0;
                    let TransportConnection { mut inbound, session } = conn;
                    self.on_connected(session).await;

                    let reason = loop {
                        tokio::select! {
                            msg = inbound.recv() => match msg {
                                Some(msg) => self.on_message(msg),
                                None => break "connection closed".to_string(),
                            },
                            _ = shutdown.cancelled() => {
                                self.on_disconnected("shutdown".to_string()).await;
                                info!("[wc-03] connection loop stopped");
                                return;
                            }
                        }
                    };
                    self.on_disconnected(reason).await;
                }
                Ok(Err(e)) => {
                    attempts += 1;
                    warn!(attempts, error = %e, "[wc-03] connect failed");
                }
                Err(_) => {
                    attempts += 1;
                    warn!(attempts, "[wc-03] connect timed out");
                }
            }

            if attempts > 0 && !should_retry(attempts, self.config.max_reconnect_attempts) {
                error!(attempts, "[wc-03] giving up on relay connection");
                break;
            }

            let delay = calculate_backoff_delay(
                self.config.reconnect_base_delay,
                self.config.reconnect_max_delay,
                attempts,
            );
            debug!(delay_ms = delay.as_millis() as u64, "[wc-03] reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }
        info!("[wc-03] connection loop stopped");
    }

    async fn on_connected(&self, session: Arc<dyn RelaySession>) {
        let mut link = self.link.lock().await;

        let desired: Vec<Topic> = self.topics.read().keys().cloned().collect();
        for topic in desired {
            match self.bounded(session.subscribe(&topic)).await {
                Ok(relay_id) => self.set_relay_id(&topic, Some(relay_id)),
                Err(e) => warn!(topic = %topic.short(), error = %e, "[wc-03] restore subscription failed"),
            }
        }

        let flushed = link.queue.len();
        while let Some(queued) = link.queue.pop_front() {
            if let Err(e) = self
                .bounded(session.publish(&queued.topic, &queued.message, queued.opts))
                .await
            {
                warn!(topic = %queued.topic.short(), error = %e, "[wc-03] queued publish failed");
                if e.is_retryable() {
                    link.queue.push_front(queued);
                    break;
                }
            }
        }

        link.session = Some(session);
        drop(link);

        self.connected.send_replace(true);
        wc_telemetry::log_event!(info, "wc-03", "[wc-03] 🔗 relay connected", flushed = flushed);
        self.events.publish(RelayerEvent::Connect);
    }

    async fn on_disconnected(&self, reason: String) {
        self.link.lock().await.session = None;
        for sub in self.topics.write().values_mut() {
            sub.relay_id = None;
        }
        if self.connected.send_replace(false) {
            warn!(reason = %reason, "[wc-03] relay disconnected");
            self.events.publish(RelayerEvent::Disconnect { reason });
        }
    }

    fn on_message(&self, msg: RelayMessage) {
        if !self.topics.read().contains_key(&msg.topic) {
            debug!(topic = %msg.topic.short(), "[wc-03] message for unsubscribed topic dropped");
            return;
        }

        let mut material = Vec::with_capacity(msg.topic.as_str().len() + msg.message.len());
        material.extend_from_slice(msg.topic.as_str().as_bytes());
        material.extend_from_slice(msg.message.as_bytes());
        if !self.seen.lock().check_and_insert(sha256(&material)) {
            debug!(topic = %msg.topic.short(), "[wc-03] duplicate delivery dropped");
            return;
        }

        self.events.publish(RelayerEvent::Message(msg));
    }

    fn set_relay_id(&self, topic: &Topic, relay_id: Option<String>) {
        if let Some(sub) = self.topics.write().get_mut(topic) {
            sub.relay_id = relay_id;
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, RelayerError>>,
    ) -> Result<T, RelayerError> {
        let limit = self.config.publish_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RelayerError::Timeout(limit.as_millis() as u64))?
    }

    async fn current_session(&self) -> Option<Arc<dyn RelaySession>> {
        self.link.lock().await.session.clone()
    }
}

#[async_trait]
impl RelayerApi for Relayer {
    async fn publish(
        &self,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError> {
        self.events.publish(RelayerEvent::Publish {
            topic: topic.clone(),
            message: message.to_string(),
            opts,
        });

        let mut link = self.link.lock().await;
        let Some(session) = link.session.clone() else {
            return match self.config.disconnected_policy {
                DisconnectedPolicy::Queue => {
                    debug!(topic = %topic.short(), ttl = opts.ttl, "[wc-03] publish queued");
                    link.queue.push_back(QueuedPublish {
                        topic: topic.clone(),
                        message: message.to_string(),
                        opts,
                    });
                    Ok(())
                }
                DisconnectedPolicy::Fail => Err(RelayerError::NotConnected),
            };
        };
        drop(link);

        match self.bounded(session.publish(topic, message, opts)).await {
            Ok(()) => {}
            Err(RelayerError::NotConnected)
                if self.config.disconnected_policy == DisconnectedPolicy::Queue =>
            {
                // The session died under us. Retry on a fresh one or queue
                // for the reconnect flush.
                let mut link = self.link.lock().await;
                match link.session.clone() {
                    Some(fresh) if !Arc::ptr_eq(&fresh, &session) => {
                        drop(link);
                        self.bounded(fresh.publish(topic, message, opts)).await?;
                    }
                    _ => {
                        debug!(topic = %topic.short(), "[wc-03] stale session, publish queued");
                        link.queue.push_back(QueuedPublish {
                            topic: topic.clone(),
                            message: message.to_string(),
                            opts,
                        });
                        return Ok(());
                    }
                }
            }
            Err(e) => return Err(e),
        }
        debug!(topic = %topic.short(), ttl = opts.ttl, tag = opts.tag, "[wc-03] published");
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionHandle, RelayerError> {
        let handle = {
            let mut topics = self.topics.write();
            if let Some(existing) = topics.get(topic) {
                return Ok(existing.handle.clone());
            }
            let handle = SubscriptionHandle {
                id: self.next_handle.fetch_add(1, Ordering::Relaxed).to_string(),
                topic: topic.clone(),
            };
            topics.insert(
                topic.clone(),
                TopicSubscription {
                    handle: handle.clone(),
                    relay_id: None,
                },
            );
            handle
        };

        let result = match self.current_session().await {
            Some(session) => self.bounded(session.subscribe(topic)).await,
            None => Err(RelayerError::NotConnected),
        };

        match result {
            Ok(relay_id) => {
                self.set_relay_id(topic, Some(relay_id.clone()));
                debug!(topic = %topic.short(), relay_id = %relay_id, "[wc-03] subscribed");
                self.events.publish(RelayerEvent::Subscribe {
                    topic: topic.clone(),
                    id: relay_id,
                });
                Ok(handle)
            }
            Err(e) if self.config.disconnected_policy == DisconnectedPolicy::Queue && e.is_retryable() => {
                // Restored by the next successful connect.
                debug!(topic = %topic.short(), error = %e, "[wc-03] subscription deferred");
                Ok(handle)
            }
            Err(e) => {
                self.topics.write().remove(topic);
                Err(e)
            }
        }
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), RelayerError> {
        let removed = {
            let mut topics = self.topics.write();
            match topics.get(&handle.topic) {
                Some(sub) if sub.handle.id == handle.id => topics.remove(&handle.topic),
                _ => None,
            }
        };
        let Some(removed) = removed else {
            return Err(RelayerError::NotSubscribed(handle.topic.to_string()));
        };

        if let (Some(relay_id), Some(session)) = (removed.relay_id, self.current_session().await) {
            if let Err(e) = self.bounded(session.unsubscribe(&handle.topic, &relay_id)).await {
                // The relay drops it with the connection anyway.
                warn!(topic = %handle.topic.short(), error = %e, "[wc-03] relay unsubscribe failed");
            }
        }

        debug!(topic = %handle.topic.short(), "[wc-03] unsubscribed");
        self.events.publish(RelayerEvent::Unsubscribe {
            topic: handle.topic.clone(),
            id: handle.id.clone(),
        });
        Ok(())
    }

    async fn unsubscribe_topic(&self, topic: &Topic) -> Result<(), RelayerError> {
        let handle = self.topics.read().get(topic).map(|s| s.handle.clone());
        match handle {
            Some(handle) => self.unsubscribe(&handle).await,
            None => Ok(()),
        }
    }

    fn is_subscribed(&self, topic: &Topic) -> bool {
        self.topics.read().contains_key(topic)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn wait_connected(&self, timeout: Duration) -> Result<(), RelayerError> {
        let mut rx = self.connected.subscribe();
        let outcome = match tokio::time::timeout(timeout, rx.wait_for(|up| *up)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(RelayerError::NotConnected),
            Err(_) => Err(RelayerError::Timeout(timeout.as_millis() as u64)),
        };
        outcome
    }

    fn subscribe_events(&self) -> Subscription<RelayerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRelay;
    use shared_types::cancel_pair;

    const TOPIC: &str = "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9";

    fn topic() -> Topic {
        Topic::parse(TOPIC).unwrap()
    }

    fn fast_config() -> RelayerConfig {
        RelayerConfig {
            reconnect_base_delay: Duration::from_millis(10),
            reconnect_max_delay: Duration::from_millis(50),
            publish_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(2),
            ..RelayerConfig::default()
        }
    }

    fn relayer(hub: &InMemoryRelay, config: RelayerConfig) -> Arc<Relayer> {
        Arc::new(Relayer::new(config, Arc::new(hub.transport())))
    }

    async fn next_message(sub: &mut Subscription<RelayerEvent>) -> RelayMessage {
        let event = sub
            .recv_matching(Duration::from_secs(2), |e| matches!(e, RelayerEvent::Message(_)))
            .await
            .unwrap();
        match event {
            RelayerEvent::Message(msg) => msg,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_publish_event_reports_exact_options() {
        let hub = InMemoryRelay::new();
        let relayer = relayer(&hub, fast_config());
        let mut events = relayer.subscribe_events();

        let opts = PublishOptions::new(120, 3000).with_prompt(true);
        relayer.publish(&topic(), "ciphertext", opts).await.unwrap();

        let event = events
            .recv_matching(Duration::from_secs(1), |e| matches!(e, RelayerEvent::Publish { .. }))
            .await
            .unwrap();
        assert_eq!(
            event,
            RelayerEvent::Publish {
                topic: topic(),
                message: "ciphertext".into(),
                opts,
            }
        );
    }

    #[tokio::test]
    async fn test_fail_policy_rejects_while_disconnected() {
        let hub = InMemoryRelay::new();
        let config = RelayerConfig {
            disconnected_policy: DisconnectedPolicy::Fail,
            ..fast_config()
        };
        let relayer = relayer(&hub, config);

        assert_eq!(
            relayer.publish(&topic(), "x", PublishOptions::new(30, 1)).await,
            Err(RelayerError::NotConnected)
        );
        assert_eq!(relayer.subscribe(&topic()).await, Err(RelayerError::NotConnected));
        assert!(!relayer.is_subscribed(&topic()));
    }

    #[tokio::test]
    async fn test_queued_publishes_flush_after_connect() {
        let hub = InMemoryRelay::new();
        let sender = relayer(&hub, fast_config());
        let receiver = relayer(&hub, fast_config());

        sender.publish(&topic(), "first", PublishOptions::new(300, 1)).await.unwrap();
        sender.publish(&topic(), "second", PublishOptions::new(300, 1)).await.unwrap();
        assert_eq!(sender.queued().await, 2);

        let (handle, signal) = cancel_pair();
        receiver.start(signal.clone());
        receiver.wait_connected(Duration::from_secs(2)).await.unwrap();
        let mut inbound = receiver.subscribe_events();
        receiver.subscribe(&topic()).await.unwrap();

        sender.start(signal);
        sender.wait_connected(Duration::from_secs(2)).await.unwrap();

        assert_eq!(next_message(&mut inbound).await.message, "first");
        assert_eq!(next_message(&mut inbound).await.message, "second");
        assert_eq!(sender.queued().await, 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_subscriptions_restored_after_reconnect() {
        let hub = InMemoryRelay::new();
        let sender = relayer(&hub, fast_config());
        let receiver = relayer(&hub, fast_config());
        let (handle, signal) = cancel_pair();
        sender.start(signal.clone());
        receiver.start(signal);
        sender.wait_connected(Duration::from_secs(2)).await.unwrap();
        receiver.wait_connected(Duration::from_secs(2)).await.unwrap();

        let mut events = receiver.subscribe_events();
        receiver.subscribe(&topic()).await.unwrap();

        hub.drop_connections();
        events
            .recv_matching(Duration::from_secs(2), |e| matches!(e, RelayerEvent::Disconnect { .. }))
            .await
            .unwrap();
        events
            .recv_matching(Duration::from_secs(2), |e| matches!(e, RelayerEvent::Connect))
            .await
            .unwrap();
        sender.publish(&topic(), "after", PublishOptions::new(300, 1)).await.unwrap();
        assert_eq!(next_message(&mut events).await.message, "after");
        assert!(receiver.is_subscribed(&topic()));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_duplicate_delivery_collapsed() {
        let hub = InMemoryRelay::new();
        let receiver = relayer(&hub, fast_config());
        receiver.topics.write().insert(
            topic(),
            TopicSubscription {
                handle: SubscriptionHandle {
                    id: "1".into(),
                    topic: topic(),
                },
                relay_id: None,
            },
        );
        let mut events = receiver.subscribe_events();

        receiver.on_message(RelayMessage::new(topic(), "same"));
        receiver.on_message(RelayMessage::new(topic(), "same"));

        assert!(events.try_recv().unwrap().is_some());
        assert!(events.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_unsubscribe_checks_handle() {
        let hub = InMemoryRelay::new();
        let relayer = relayer(&hub, fast_config());
        let a = relayer.subscribe(&topic()).await.unwrap();
        let b = relayer.subscribe(&topic()).await.unwrap();
        assert_eq!(a, b);

        let stale = SubscriptionHandle {
            id: "999".into(),
            topic: topic(),
        };
        assert!(matches!(
            relayer.unsubscribe(&stale).await,
            Err(RelayerError::NotSubscribed(_))
        ));
        relayer.unsubscribe(&a).await.unwrap();
        assert!(!relayer.is_subscribed(&topic()));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let hub = InMemoryRelay::new();
        hub.set_online(false);
        let config = RelayerConfig {
            max_reconnect_attempts: Some(2),
            ..fast_config()
        };
        let relayer = relayer(&hub, config);
        let (_handle, signal) = cancel_pair();
        let task = relayer.start(signal);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!relayer.is_connected());
        assert!(matches!(
            relayer.wait_connected(Duration::from_millis(20)).await,
            Err(RelayerError::Timeout(_))
        ));
    }
}

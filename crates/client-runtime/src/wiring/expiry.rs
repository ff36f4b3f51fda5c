//! Expiry notifications to their owners.

use shared_bus::Subscription;
use shared_types::CancelSignal;
use std::sync::Arc;
use tracing::info;
use wc_01_expirer::{ExpirerEvent, ExpiryTarget};
use wc_04_pairing::PairingManager;
use wc_06_auth::AuthEngine;

pub struct ExpiryRouter {
    pairing: Arc<PairingManager>,
    auth: Arc<AuthEngine>,
}

impl ExpiryRouter {
    pub fn new(pairing: Arc<PairingManager>, auth: Arc<AuthEngine>) -> Self {
        Self { pairing, auth }
    }

    pub async fn route(&self, event: &ExpirerEvent) {
        let ExpirerEvent::Expired { target, .. } = event else {
            return;
        };
        match target {
            ExpiryTarget::Topic(_) => self.pairing.on_expired(target).await,
            ExpiryTarget::Id(_) => self.auth.on_expired(target).await,
        }
    }

    pub async fn run(self, mut events: Subscription<ExpirerEvent>, shutdown: CancelSignal) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.route(&event).await,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        info!("[runtime] expiry router stopped");
    }
}

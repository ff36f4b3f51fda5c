//! # Pairing Flows
//!
//! Pairing lifecycle between two clients without any sign-in traffic.

#[cfg(test)]
mod tests {
    use crate::harness::{client, STEP};
    use shared_types::CancelSignal;
    use wc_03_relayer::InMemoryRelay;
    use wc_04_pairing::{PairingApi, PairingError, PairingEvent, PairingState};

    #[tokio::test]
    async fn test_both_sides_list_new_pairing() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();

        let created = app.pairing().create(None).await.unwrap();
        let paired = wallet
            .pairing()
            .pair(created.uri.as_deref().unwrap(), CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(paired.topic, created.topic);
        assert_eq!(paired.expiry, created.expiry);
        assert_eq!(app.pairing().pairings().len(), 1);
        assert_eq!(wallet.pairing().pairings().len(), 1);
        assert!(!app.pairing().is_active(&created.topic));
        assert_eq!(app.pairing().get(&created.topic).unwrap().state, PairingState::Proposed);
    }

    #[tokio::test]
    async fn test_pairing_same_uri_twice_fails() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();

        let created = app.pairing().create(None).await.unwrap();
        let uri = created.uri.as_deref().unwrap();
        wallet.pairing().pair(uri, CancelSignal::never()).await.unwrap();
        assert!(matches!(
            wallet.pairing().pair(uri, CancelSignal::never()).await,
            Err(PairingError::AlreadyPaired(topic)) if topic == created.topic
        ));
    }

    #[tokio::test]
    async fn test_ping_reaches_peer() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut wallet_events = wallet.pairing().subscribe_events();

        let created = app.pairing().create(None).await.unwrap();
        wallet.pairing().pair(created.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();

        app.pairing()
            .ping(&created.topic, Some(STEP), CancelSignal::never())
            .await
            .unwrap();
        let event = wallet_events
            .recv_matching(STEP, |e| matches!(e, PairingEvent::Ping { .. }))
            .await
            .unwrap();
        assert_eq!(event.topic(), &created.topic);
    }

    #[tokio::test]
    async fn test_disconnect_removes_pairing_on_both_sides() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut wallet_events = wallet.pairing().subscribe_events();

        let created = app.pairing().create(None).await.unwrap();
        wallet.pairing().pair(created.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();

        app.pairing().disconnect(&created.topic).await.unwrap();
        assert!(app.pairing().get(&created.topic).is_none());

        let event = wallet_events
            .recv_matching(STEP, |e| matches!(e, PairingEvent::Delete { .. }))
            .await
            .unwrap();
        assert_eq!(event.topic(), &created.topic);
        assert!(wallet.pairing().get(&created.topic).is_none());
        assert!(!wallet.relayer().topics().contains(&created.topic));
    }

    #[tokio::test]
    async fn test_ping_to_unknown_pairing_fails() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let created = app.pairing().create(None).await.unwrap();
        app.pairing().disconnect(&created.topic).await.unwrap();

        assert!(matches!(
            app.pairing()
                .ping(&created.topic, Some(STEP), CancelSignal::never())
                .await,
            Err(PairingError::NotFound(_))
        ));
    }
}

//! # Sign-In Flows
//!
//! An app client requests a sign-in, a wallet client answers it. Each test
//! runs both clients against a fresh relay.

#[cfg(test)]
mod tests {
    use crate::harness::{
        client, client_with_store, iss, metadata, next_request, outcome, request_params,
        sign_and_respond, STEP,
    };
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{CancelSignal, ErrorPayload, FileBackedKVStore, KeyValueStore};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use wc_03_relayer::{InMemoryRelay, RelayerApi, RelayerEvent};
    use wc_04_pairing::PairingApi;
    use wc_06_auth::{
        AuthApi, AuthEvent, CacaoSignature, ErrorReason, RespondParams, AUTH_REQUEST,
    };

    fn topics(pairings: Vec<wc_04_pairing::Pairing>) -> BTreeSet<String> {
        pairings.into_iter().map(|p| p.topic.to_string()).collect()
    }

    // =========================================================================
    // FULL EXCHANGE
    // =========================================================================

    #[tokio::test]
    async fn test_completed_exchange_leaves_peers_in_agreement() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let mut wallet_events = wallet.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();
        assert_eq!(request.id, sent.id);
        assert_eq!(request.topic, sent.topic);

        sign_and_respond(&wallet, &key, &request).await.unwrap();
        let event = outcome(&mut app_events, sent.id).await.unwrap();
        let AuthEvent::Responded { cacao, .. } = event else {
            panic!("expected Responded, got {event:?}");
        };
        assert_eq!(cacao.p.iss, iss(&key));
        assert!(!cacao.s.raw().is_empty());

        assert_eq!(topics(app.auth().pairings()), topics(wallet.auth().pairings()));
        assert_eq!(app.history().size(), wallet.history().size());
        assert!(app.pairing().is_active(&sent.topic));
        assert!(wallet.pairing().is_active(&sent.topic));
    }

    #[tokio::test]
    async fn test_known_pairing_is_reused_without_uri() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let mut wallet_events = wallet.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let first = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(first.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();
        sign_and_respond(&wallet, &key, &request).await.unwrap();
        outcome(&mut app_events, first.id).await.unwrap();

        let app_history = app.history().size();
        let wallet_history = wallet.history().size();
        let app_pairings = app.pairing().pairings().len();
        let wallet_pairings = wallet.pairing().pairings().len();

        let second = app
            .auth()
            .request(request_params(), Some(&first.topic), CancelSignal::never())
            .await
            .unwrap();
        assert!(second.uri.is_none());
        assert_eq!(second.topic, first.topic);

        let request = next_request(&mut wallet_events).await.unwrap();
        assert_eq!(request.id, second.id);
        sign_and_respond(&wallet, &key, &request).await.unwrap();
        let event = outcome(&mut app_events, second.id).await.unwrap();
        assert!(matches!(event, AuthEvent::Responded { .. }));

        // Each side keeps one record per exchange.
        assert_eq!(app.history().size(), app_history + 1);
        assert_eq!(wallet.history().size(), wallet_history + 1);
        assert_eq!(app.pairing().pairings().len(), app_pairings);
        assert_eq!(wallet.pairing().pairings().len(), wallet_pairings);
    }

    // =========================================================================
    // RESPONSES
    // =========================================================================

    #[tokio::test]
    async fn test_error_response_keeps_pairing_inactive() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let mut wallet_events = wallet.auth().subscribe_events();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();

        wallet
            .auth()
            .respond(
                RespondParams::Error {
                    id: request.id,
                    error: ErrorPayload::new(14001, "Can not login"),
                },
                &iss(&Secp256k1KeyPair::generate()),
                CancelSignal::never(),
            )
            .await
            .unwrap();

        match outcome(&mut app_events, sent.id).await.unwrap() {
            AuthEvent::Error {
                reason: ErrorReason::Peer(error),
                ..
            } => {
                assert_eq!(error.code, 14001);
                assert_eq!(error.message, "Can not login");
            }
            other => panic!("expected a peer error, got {other:?}"),
        }
        assert!(!app.pairing().is_active(&sent.topic));
        assert!(!wallet.pairing().is_active(&sent.topic));

        let history = app.auth().auth_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].response.as_ref().unwrap_err().code, 14001);
    }

    #[tokio::test]
    async fn test_successful_response_is_in_auth_history() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let mut wallet_events = wallet.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();
        sign_and_respond(&wallet, &key, &request).await.unwrap();
        outcome(&mut app_events, sent.id).await.unwrap();

        let app_history = app.auth().auth_history();
        assert_eq!(app_history.len(), 1);
        let entry = &app_history[0];
        assert_eq!(entry.id, sent.id);
        assert_eq!(entry.topic, sent.topic);
        let cacao = entry.response.as_ref().unwrap();
        assert_eq!(cacao.p.domain, "app.example");
        assert!(matches!(cacao.s, CacaoSignature::Eip191 { .. }));

        // The wallet holds the same exchange.
        assert_eq!(wallet.auth().auth_history().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_over_other_message_is_rejected() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let mut wallet_events = wallet.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();

        let mut tampered = request.params.payload_params.clone();
        tampered.statement = Some("Transfer everything".into());
        let message = wallet.auth().format_message(&tampered, &iss(&key)).unwrap();
        let signature = key.sign_personal(message.as_bytes()).unwrap();
        wallet
            .auth()
            .respond(
                RespondParams::Result {
                    id: request.id,
                    signature: CacaoSignature::eip191(signature),
                },
                &iss(&key),
                CancelSignal::never(),
            )
            .await
            .unwrap();

        let event = outcome(&mut app_events, sent.id).await.unwrap();
        assert!(
            matches!(
                event,
                AuthEvent::Error {
                    reason: ErrorReason::InvalidSignature(_),
                    ..
                }
            ),
            "got {event:?}"
        );
        assert!(!app.pairing().is_active(&sent.topic));
    }

    // =========================================================================
    // REQUEST OPTIONS
    // =========================================================================

    #[tokio::test]
    async fn test_custom_request_expiry_sets_publish_ttl() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let mut relay_events = app.relayer().subscribe_events();

        let mut params = request_params();
        params.expiry = Some(1000);
        let sent = app
            .auth()
            .request(params, None, CancelSignal::never())
            .await
            .unwrap();

        let published = relay_events
            .recv_matching(STEP, |e| {
                matches!(e, RelayerEvent::Publish { opts, .. } if opts.tag == AUTH_REQUEST.request.tag)
            })
            .await
            .unwrap();
        let RelayerEvent::Publish { topic, opts, .. } = published else {
            unreachable!()
        };
        assert_eq!(topic, sent.topic);
        assert_eq!(opts.ttl, 1000);
    }

    #[tokio::test]
    async fn test_wallet_receives_requester_metadata() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut wallet_events = wallet.auth().subscribe_events();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();

        assert_eq!(request.params.requester.metadata, metadata("app"));
        let pairing = wallet.pairing().get(&sent.topic).unwrap();
        assert_eq!(pairing.peer_metadata, Some(metadata("app")));
    }

    #[tokio::test]
    async fn test_pending_requests_until_answered() {
        let hub = InMemoryRelay::new();
        let app = client(&hub, "app").await.unwrap();
        let wallet = client(&hub, "wallet").await.unwrap();
        let mut wallet_events = wallet.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        let request = next_request(&mut wallet_events).await.unwrap();

        let pending = wallet.auth().pending_requests();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&sent.id].topic, sent.topic);
        assert_eq!(wallet.auth().requests().len(), 1);
        assert!(app.auth().pending_requests().is_empty());

        sign_and_respond(&wallet, &key, &request).await.unwrap();
        assert!(wallet.auth().pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_restart_keeps_pending_request() {
        let hub = InMemoryRelay::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let app = client(&hub, "app").await.unwrap();
        let mut app_events = app.auth().subscribe_events();
        let key = Secp256k1KeyPair::generate();

        let sent = app
            .auth()
            .request(request_params(), None, CancelSignal::never())
            .await
            .unwrap();

        let store: Arc<dyn KeyValueStore> = Arc::new(FileBackedKVStore::open(&path).unwrap());
        let wallet = client_with_store(&hub, "wallet", store).await.unwrap();
        let mut wallet_events = wallet.auth().subscribe_events();
        wallet.pairing().pair(sent.uri.as_deref().unwrap(), CancelSignal::never()).await.unwrap();
        next_request(&mut wallet_events).await.unwrap();
        wallet.shutdown().await;
        drop(wallet);

        // Fresh handle on the same file.
        let store: Arc<dyn KeyValueStore> = Arc::new(FileBackedKVStore::open(&path).unwrap());
        let wallet = client_with_store(&hub, "wallet", store).await.unwrap();
        let restored = wallet.auth().requests();
        assert_eq!(restored.len(), 1);
        sign_and_respond(&wallet, &key, &restored[0]).await.unwrap();

        let event = outcome(&mut app_events, sent.id).await.unwrap();
        assert!(matches!(event, AuthEvent::Responded { .. }));
    }
}

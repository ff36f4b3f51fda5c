//! # Components
//!
//! ```text
//! Level 0: store, clock
//! Level 1: Relayer, Expirer, History, Verify resolver
//! Level 2: Pairing Manager (Relayer, Expirer)
//! Level 3: Auth Engine (Pairing, History, Expirer, Verify)
//! ```

use crate::container::config::ClientConfig;
use shared_types::{
    FileBackedKVStore, InMemoryKVStore, KVStoreError, KeyValueStore, SystemTimeSource, TimeSource,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use wc_01_expirer::{Expirer, ExpirerError};
use wc_02_history::{HistoryError, JsonRpcHistory};
use wc_03_relayer::{RelayTransport, Relayer, RelayerError};
use wc_04_pairing::{PairingError, PairingManager, RelayProtocol};
use wc_05_verify::{AttestationSource, NoAttestation, VerifyContextResolver};
use wc_06_auth::{AuthEngine, AuthError, ContractSignatureVerifier};

use super::config::ConfigError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no relay transport configured")]
    MissingTransport,

    #[error(transparent)]
    Storage(#[from] KVStoreError),

    #[error(transparent)]
    Expirer(#[from] ExpirerError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Relayer(#[from] RelayerError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Every component of one client.
pub struct Components {
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn TimeSource>,
    pub relayer: Arc<Relayer>,
    pub expirer: Arc<Expirer>,
    pub history: Arc<JsonRpcHistory>,
    pub verify: Arc<VerifyContextResolver>,
    pub pairing: Arc<PairingManager>,
    pub auth: Arc<AuthEngine>,
}

/// Overrides for the pieces a config cannot describe. Anything not set
/// falls back to what the config and enabled features select.
#[derive(Default)]
pub struct ComponentsBuilder {
    transport: Option<Arc<dyn RelayTransport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn TimeSource>>,
    attestation: Option<Arc<dyn AttestationSource>>,
    contracts: Option<Arc<dyn ContractSignatureVerifier>>,
}

impl ComponentsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(mut self, transport: Arc<dyn RelayTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn attestation(mut self, source: Arc<dyn AttestationSource>) -> Self {
        self.attestation = Some(source);
        self
    }

    pub fn contracts(mut self, verifier: Arc<dyn ContractSignatureVerifier>) -> Self {
        self.contracts = Some(verifier);
        self
    }

    /// Build in dependency order. Each component restores its persisted
    /// state on construction.
    pub fn build(self, config: &ClientConfig) -> Result<Components, RuntimeError> {
        config.validate()?;

        let store: Arc<dyn KeyValueStore> = match (self.store, config.storage.store_path()) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileBackedKVStore::open(path)?),
            (None, None) => Arc::new(InMemoryKVStore::new()),
        };
        let clock: Arc<dyn TimeSource> = self.clock.unwrap_or_else(|| Arc::new(SystemTimeSource));
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(config)?,
        };

        let relayer = Arc::new(Relayer::new(config.relayer.clone(), transport));
        let expirer = Arc::new(Expirer::new(store.clone(), clock.clone())?);
        let history = Arc::new(JsonRpcHistory::new(store.clone(), clock.clone())?);
        let verify = Arc::new(VerifyContextResolver::new(
            match self.attestation {
                Some(source) => source,
                None => default_attestation(config),
            },
            config.verify.resolve_timeout,
        ));
        info!("[runtime] level 1 ready: relayer, expirer, history, verify");

        let pairing = Arc::new(PairingManager::new(
            config.pairing.clone(),
            RelayProtocol::new(config.relayer.protocol.clone()),
            relayer.clone(),
            expirer.clone(),
            store.clone(),
            clock.clone(),
        )?);
        info!("[runtime] level 2 ready: pairing");

        let contracts = match self.contracts {
            Some(verifier) => verifier,
            None => default_contracts(config)?,
        };
        let auth = Arc::new(AuthEngine::new(
            config.auth.clone(),
            pairing.clone(),
            history.clone(),
            expirer.clone(),
            verify.clone(),
            contracts,
            store.clone(),
            clock.clone(),
        )?);
        info!("[runtime] level 3 ready: auth");

        Ok(Components {
            store,
            clock,
            relayer,
            expirer,
            history,
            verify,
            pairing,
            auth,
        })
    }
}

#[cfg(feature = "websocket")]
fn default_transport(config: &ClientConfig) -> Result<Arc<dyn RelayTransport>, RuntimeError> {
    Ok(Arc::new(wc_03_relayer::WebSocketTransport::new(&config.relayer)?))
}

#[cfg(not(feature = "websocket"))]
fn default_transport(_config: &ClientConfig) -> Result<Arc<dyn RelayTransport>, RuntimeError> {
    Err(RuntimeError::MissingTransport)
}

#[cfg(feature = "http")]
fn default_attestation(config: &ClientConfig) -> Arc<dyn AttestationSource> {
    match wc_05_verify::HttpAttestationSource::new(
        config.verify.verify_url.clone(),
        config.verify.resolve_timeout,
    ) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::warn!(error = %e, "[runtime] verify server unavailable, contexts will be Unknown");
            Arc::new(NoAttestation)
        }
    }
}

#[cfg(not(feature = "http"))]
fn default_attestation(_config: &ClientConfig) -> Arc<dyn AttestationSource> {
    Arc::new(NoAttestation)
}

#[cfg(feature = "http")]
fn default_contracts(config: &ClientConfig) -> Result<Arc<dyn ContractSignatureVerifier>, RuntimeError> {
    Ok(Arc::new(wc_06_auth::RpcContractVerifier::new(
        wc_06_auth::DEFAULT_RPC_URL,
        config.relayer.project_id.clone(),
        config.relayer.publish_timeout,
    )?))
}

#[cfg(not(feature = "http"))]
fn default_contracts(_config: &ClientConfig) -> Result<Arc<dyn ContractSignatureVerifier>, RuntimeError> {
    Ok(Arc::new(wc_06_auth::NoContractVerifier))
}

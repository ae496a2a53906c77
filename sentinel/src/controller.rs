//! # Sentinel Controller
//!
//! The orchestrator. Exposes the two entry protocols (`execute`, `validate`),
//! wires a submitted transaction through static validation, batched proof
//! verification, and then either coordinator submission or peer attestation
//! gathering, and owns the batch timer and client handles.
//!
//! Entry points accept a transaction and a callback; the callback fires
//! exactly once per accepted request, from a background task once the
//! request has run its course. Calling entry points before [`Controller::init`]
//! has succeeded is a precondition violation: `execute` refuses the request,
//! nothing worse happens, but results are meaningless until initialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::attestation::{
    Attestation, AttestationBundle, AttestationGatherer, PeerClient, PeerSampler,
};
use crate::batch::BatchVerifier;
use crate::config::SentinelConfig;
use crate::coordinator::{CoordinatorClient, ExecuteResult, Submitter};
use crate::crypto::Keypair;
use crate::net::server::{self, ServerHandle};
use crate::transaction::{CompactTransaction, FullTransaction, ProofVerifier, SpendVerifier};

/// Receives the terminal outcome of an execute request. Invoked exactly once.
pub type ExecuteCallback = Box<dyn FnOnce(ExecuteResult) + Send + 'static>;

/// Receives the terminal outcome of a validate request: `None` when
/// validation failed, otherwise the gathered attestations. Invoked exactly
/// once.
pub type ValidateCallback = Box<dyn FnOnce(Option<AttestationBundle>) + Send + 'static>;

/// The sentinel entry-point contract. Implemented by [`Controller`]; any
/// alternative sentinel architecture implements the same two operations.
#[async_trait]
pub trait SentinelApi: Send + Sync {
    /// Commit path. Returns `false` only when the request cannot even be
    /// attempted (the controller is not initialized); an invalid transaction
    /// is a `true` return with a failure delivered through the callback.
    async fn execute_transaction(&self, tx: FullTransaction, callback: ExecuteCallback) -> bool;

    /// Attestation path. Always returns `true`; failure is communicated
    /// only through the callback, as an absent bundle.
    async fn validate_transaction(&self, tx: FullTransaction, callback: ValidateCallback) -> bool;
}

/// The concrete sentinel controller.
pub struct Controller {
    sentinel_id: u32,
    listen_addr: Option<String>,
    keypair: Keypair,
    verifier: Arc<dyn ProofVerifier>,
    batch: Arc<BatchVerifier>,
    coordinator: Arc<dyn CoordinatorClient>,
    peers: Vec<Arc<dyn PeerClient>>,
    submitter: Arc<Submitter>,
    gatherer: Arc<AttestationGatherer>,
    connected: AtomicBool,
    server: Mutex<Option<ServerHandle>>,
}

impl Controller {
    /// Builds a controller from configuration and its collaborator clients.
    /// Nothing connects until [`init`](Self::init).
    pub fn new(
        config: &SentinelConfig,
        keypair: Keypair,
        coordinator: Arc<dyn CoordinatorClient>,
        peers: Vec<Arc<dyn PeerClient>>,
        sampler: Box<dyn PeerSampler>,
    ) -> Arc<Self> {
        let verifier: Arc<dyn ProofVerifier> = Arc::new(SpendVerifier);
        let batch = Arc::new(BatchVerifier::new(
            Arc::clone(&verifier),
            config.batch_size,
            config.batch_refresh(),
        ));
        let submitter = Arc::new(Submitter::new(Arc::clone(&coordinator)));
        let gatherer = Arc::new(AttestationGatherer::new(
            peers.clone(),
            sampler,
            config.attestation_quorum,
            config.peer_timeout(),
        ));

        Arc::new(Self {
            sentinel_id: config.sentinel_id,
            listen_addr: config.listen_addr.clone(),
            keypair,
            verifier,
            batch,
            coordinator,
            peers,
            submitter,
            gatherer,
            connected: AtomicBool::new(false),
            server: Mutex::new(None),
        })
    }

    /// Connects to the coordinator and every peer, then starts the inbound
    /// request listener when a listen address is configured. Returns `false`
    /// if any required connection cannot be established; the controller
    /// never runs half-connected.
    pub async fn init(self: Arc<Self>) -> bool {
        if !self.coordinator.connect().await {
            error!("cannot reach coordinator, refusing to start");
            return false;
        }

        let probes =
            futures::future::join_all(self.peers.iter().map(|peer| peer.connect())).await;
        for (index, reachable) in probes.into_iter().enumerate() {
            if !reachable {
                error!(peer = index, "cannot reach peer sentinel, refusing to start");
                return false;
            }
        }

        if let Some(addr) = &self.listen_addr {
            match server::spawn(Arc::clone(&self), addr).await {
                Ok(handle) => {
                    info!(addr = %handle.local_addr(), "sentinel listening");
                    *self.server.lock() = Some(handle);
                }
                Err(e) => {
                    error!(addr = %addr, error = %e, "cannot bind request listener");
                    return false;
                }
            }
        }

        self.connected.store(true, Ordering::Release);
        info!(
            sentinel_id = self.sentinel_id,
            peers = self.peers.len(),
            batch_size = self.batch.batch_size(),
            "sentinel initialized"
        );
        true
    }

    /// The address the request listener actually bound, if one is running.
    /// With a `:0` listen address this is how tests learn the port.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.server.lock().as_ref().map(ServerHandle::local_addr)
    }

    /// Starts the periodic batch flush timer. Idempotent.
    pub fn batch_start_timing(&self) {
        self.batch.start_timing();
    }

    /// Stops the periodic batch flush timer. Idempotent. Buffered entries
    /// stay buffered and wait for a size-triggered flush.
    pub fn batch_stop_timing(&self) {
        self.batch.stop_timing();
    }

    /// Stops the timer and the request listener. Requests already in flight
    /// run to completion.
    pub fn shutdown(&self) {
        self.batch.stop_timing();
        if let Some(handle) = self.server.lock().take() {
            handle.stop();
        }
    }

    /// Serves a peer's attestation request: verify the compact transaction
    /// through the shared batch engine and endorse it on success.
    pub async fn attest_compact(&self, ctx: CompactTransaction) -> Option<Attestation> {
        if self.batch.add(ctx.clone()).await.is_some() {
            return None;
        }
        Attestation::sign(self.sentinel_id, &self.keypair, &ctx)
    }
}

#[async_trait]
impl SentinelApi for Controller {
    async fn execute_transaction(&self, tx: FullTransaction, callback: ExecuteCallback) -> bool {
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }

        if let Some(err) = self.verifier.check_transaction(&tx) {
            debug!(tx_id = %tx.id_hex(), error = %err, "execute rejected by static validation");
            callback(ExecuteResult::Invalid(err));
            return true;
        }

        let ctx = CompactTransaction::from_full(&tx);
        let batch = Arc::clone(&self.batch);
        let submitter = Arc::clone(&self.submitter);
        tokio::spawn(async move {
            if let Some(err) = batch.add(ctx.clone()).await {
                debug!(tx_id = %ctx.tx_id, error = %err, "execute rejected by batch verification");
                callback(ExecuteResult::Invalid(err));
                return;
            }
            callback(submitter.send_compact_tx(ctx).await);
        });
        true
    }

    async fn validate_transaction(&self, tx: FullTransaction, callback: ValidateCallback) -> bool {
        if let Some(err) = self.verifier.check_transaction(&tx) {
            debug!(tx_id = %tx.id_hex(), error = %err, "validate rejected by static validation");
            callback(None);
            return true;
        }

        let ctx = CompactTransaction::from_full(&tx);
        let batch = Arc::clone(&self.batch);
        let gatherer = Arc::clone(&self.gatherer);
        let keypair = self.keypair.clone();
        let sentinel_id = self.sentinel_id;
        tokio::spawn(async move {
            if let Some(err) = batch.add(ctx.clone()).await {
                debug!(tx_id = %ctx.tx_id, error = %err, "validate rejected by batch verification");
                callback(None);
                return;
            }
            let Some(local) = Attestation::sign(sentinel_id, &keypair, &ctx) else {
                callback(None);
                return;
            };
            let peers = gatherer.gather(&ctx).await;
            callback(Some(AttestationBundle { local, peers }));
        });
        true
    }
}

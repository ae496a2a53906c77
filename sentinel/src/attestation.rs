//! # Attestation Gathering
//!
//! The validate path: a sentinel endorses a transaction by signing its
//! digest, and gathers matching endorsements from a random subset of peer
//! sentinels until a quorum is reached or every peer has been tried.
//!
//! Peer failures are soft. A peer that is unreachable, times out, declines,
//! or returns a signature that does not verify simply contributes nothing;
//! the gatherer moves on to peers it has not asked yet. No peer is ever
//! asked twice for the same transaction.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use ed25519_dalek::Verifier;

use crate::crypto::{parse_signature, parse_verifying_key, Keypair};
use crate::transaction::CompactTransaction;

// ---------------------------------------------------------------------------
// Attestations
// ---------------------------------------------------------------------------

/// One sentinel's signed endorsement of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Identifier of the attesting sentinel.
    pub sentinel_id: u32,

    /// Hex-encoded public key the signature verifies against.
    pub public_key: String,

    /// Hex-encoded Ed25519 signature over the 32-byte transaction digest.
    pub signature: String,
}

impl Attestation {
    /// Signs the transaction digest, producing this sentinel's endorsement.
    /// Returns `None` when the compact form carries a malformed id.
    pub fn sign(sentinel_id: u32, keypair: &Keypair, ctx: &CompactTransaction) -> Option<Self> {
        let digest = ctx.id_bytes()?;
        Some(Self {
            sentinel_id,
            public_key: keypair.public_key_hex(),
            signature: keypair.sign_hex(&digest),
        })
    }

    /// Verifies the endorsement against the transaction digest it claims to
    /// cover.
    pub fn verify(&self, digest: &[u8; 32]) -> bool {
        let Some(key) = parse_verifying_key(&self.public_key) else {
            return false;
        };
        let Some(sig) = parse_signature(&self.signature) else {
            return false;
        };
        key.verify(digest, &sig).is_ok()
    }
}

/// The outcome of a successful validate request: the receiving sentinel's
/// own endorsement plus the quorum (or best-effort subset) gathered from
/// peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationBundle {
    /// Endorsement signed by the sentinel that handled the request.
    pub local: Attestation,

    /// Endorsements gathered from peers, at most one per sentinel id.
    pub peers: Vec<Attestation>,
}

// ---------------------------------------------------------------------------
// Peer selection
// ---------------------------------------------------------------------------

/// Chooses which peer to ask next.
///
/// `pick` must return an index in `0..peer_count` that is not already in
/// `requested`, or `None` when no such index exists. Injected so tests can
/// make peer selection deterministic.
pub trait PeerSampler: Send + Sync {
    fn pick(&self, peer_count: usize, requested: &HashSet<usize>) -> Option<usize>;
}

/// Production sampler: uniform over the peers not yet asked.
///
/// Rejection sampling; fine at realistic peer counts, and the requested-set
/// guard bounds the loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

impl PeerSampler for UniformSampler {
    fn pick(&self, peer_count: usize, requested: &HashSet<usize>) -> Option<usize> {
        if peer_count == 0 || requested.len() >= peer_count {
            return None;
        }
        let mut rng = rand::thread_rng();
        loop {
            let candidate = rng.gen_range(0..peer_count);
            if !requested.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
}

/// Deterministic sampler: lowest unrequested index first. Test use only,
/// but harmless in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialSampler;

impl PeerSampler for SequentialSampler {
    fn pick(&self, peer_count: usize, requested: &HashSet<usize>) -> Option<usize> {
        (0..peer_count).find(|i| !requested.contains(i))
    }
}

// ---------------------------------------------------------------------------
// Peer clients
// ---------------------------------------------------------------------------

/// Errors from a single peer interaction. All of them are soft: the
/// gatherer logs and moves on.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer protocol error: {0}")]
    Protocol(String),
}

/// A connection to one peer sentinel.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Probes reachability. Used once at startup; a `false` here fails
    /// sentinel initialization.
    async fn connect(&self) -> bool;

    /// Asks the peer to attest to a transaction. `Ok(None)` means the peer
    /// declined (it considered the transaction invalid).
    async fn request_attestation(
        &self,
        ctx: CompactTransaction,
    ) -> Result<Option<Attestation>, PeerError>;
}

// ---------------------------------------------------------------------------
// Gatherer
// ---------------------------------------------------------------------------

/// Gathers peer endorsements for the validate path.
pub struct AttestationGatherer {
    peers: Vec<Arc<dyn PeerClient>>,
    sampler: Box<dyn PeerSampler>,
    quorum: usize,
    peer_timeout: Duration,
}

impl AttestationGatherer {
    pub fn new(
        peers: Vec<Arc<dyn PeerClient>>,
        sampler: Box<dyn PeerSampler>,
        quorum: usize,
        peer_timeout: Duration,
    ) -> Self {
        Self {
            peers,
            sampler,
            quorum,
            peer_timeout,
        }
    }

    /// The configured quorum.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Collects peer attestations for `ctx` until the quorum is reached or
    /// every peer has been asked. Returns whatever verified endorsements
    /// were gathered; the caller decides whether a short set is acceptable.
    ///
    /// Peers are asked in waves sized to the remaining shortfall, each wave
    /// in parallel with a per-peer timeout.
    pub async fn gather(&self, ctx: &CompactTransaction) -> Vec<Attestation> {
        let Some(digest) = ctx.id_bytes() else {
            warn!(tx_id = %ctx.tx_id, "cannot gather attestations for malformed tx id");
            return Vec::new();
        };

        let mut requested: HashSet<usize> = HashSet::new();
        let mut seen_ids: HashSet<u32> = HashSet::new();
        let mut collected: Vec<Attestation> = Vec::new();

        while collected.len() < self.quorum && requested.len() < self.peers.len() {
            let needed = self.quorum - collected.len();
            let mut wave = Vec::with_capacity(needed);
            while wave.len() < needed {
                match self.sampler.pick(self.peers.len(), &requested) {
                    Some(index) => {
                        requested.insert(index);
                        wave.push(index);
                    }
                    None => break,
                }
            }
            if wave.is_empty() {
                break;
            }

            let responses = futures::future::join_all(wave.into_iter().map(|index| {
                let peer = Arc::clone(&self.peers[index]);
                let ctx = ctx.clone();
                let deadline = self.peer_timeout;
                async move {
                    let outcome =
                        tokio::time::timeout(deadline, peer.request_attestation(ctx)).await;
                    (index, outcome)
                }
            }))
            .await;

            for (index, outcome) in responses {
                match outcome {
                    Ok(Ok(Some(attestation))) => {
                        if !attestation.verify(&digest) {
                            warn!(peer = index, tx_id = %ctx.tx_id, "peer attestation failed verification");
                        } else if !seen_ids.insert(attestation.sentinel_id) {
                            warn!(
                                peer = index,
                                sentinel_id = attestation.sentinel_id,
                                "duplicate sentinel id in attestation, dropping"
                            );
                        } else {
                            collected.push(attestation);
                        }
                    }
                    Ok(Ok(None)) => {
                        debug!(peer = index, tx_id = %ctx.tx_id, "peer declined to attest");
                    }
                    Ok(Err(e)) => {
                        warn!(peer = index, error = %e, "peer attestation request failed");
                    }
                    Err(_) => {
                        warn!(peer = index, "peer attestation request timed out");
                    }
                }
            }
        }

        debug!(
            tx_id = %ctx.tx_id,
            gathered = collected.len(),
            quorum = self.quorum,
            asked = requested.len(),
            "attestation gathering concluded"
        );
        collected
    }
}

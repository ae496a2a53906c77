//! # Sentinel Configuration
//!
//! Every tunable the sentinel consumes lives here, either as a named default
//! constant or as a field of [`SentinelConfig`]. The defaults are tuned for a
//! devnet deployment; production operators are expected to override them
//! through the node's config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Number of pending entries that triggers a size-based batch flush.
///
/// Batched spend-proof verification is asymptotically cheaper per item than
/// verifying one transaction at a time, so we want the batch reasonably full
/// before paying the verification cost.
pub const VERIFICATION_BATCH_SIZE: usize = 100;

/// Period of the timer-driven batch flush, in milliseconds.
///
/// Bounds the latency a lone transaction pays when traffic is too thin to
/// fill a batch. 250 ms keeps intake latency well under typical end-to-end
/// commit latency.
pub const VERIFICATION_BATCH_REFRESH_MS: u64 = 250;

/// Number of peer attestations considered a sufficient quorum on the
/// validate path.
pub const DEFAULT_ATTESTATION_QUORUM: usize = 2;

/// Bounded wait for a single peer attestation request, in milliseconds.
/// A peer that does not answer within this window contributes nothing to
/// the round; it is not retried.
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 2_000;

/// Dial timeout for outbound coordinator/peer connections, in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Hard cap on a single wire frame. Anything larger is a protocol violation,
/// not a transaction.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Default inbound RPC port for a sentinel.
pub const DEFAULT_LISTEN_PORT: u16 = 7601;

// ---------------------------------------------------------------------------
// SentinelConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for one sentinel.
///
/// Loaded from a JSON file by the node binary; constructed directly in tests.
/// The signing key is carried as optional hex so a config file *can* embed it
/// on devnet, while production deployments pass the key out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// This node's numeric identity within the sentinel set. Immutable for
    /// the controller's lifetime; stamped into every attestation it signs.
    pub sentinel_id: u32,

    /// Address the inbound request listener binds to. `None` disables the
    /// listener entirely (useful for embedding and for tests).
    pub listen_addr: Option<String>,

    /// Endpoint of the coordinator cluster the execute path submits to.
    pub coordinator_endpoint: String,

    /// Endpoints of the peer sentinels the validate path gathers
    /// attestations from.
    pub peer_endpoints: Vec<String>,

    /// Hex-encoded Ed25519 signing key. Optional here; the node binary
    /// falls back to its key file when absent.
    pub signing_key_hex: Option<String>,

    /// Pending entries that trigger a size-based flush.
    pub batch_size: usize,

    /// Timer-driven flush period in milliseconds.
    pub batch_refresh_ms: u64,

    /// Peer attestations that conclude a gathering round early.
    pub attestation_quorum: usize,

    /// Per-peer attestation request timeout in milliseconds.
    pub peer_timeout_ms: u64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            sentinel_id: 0,
            listen_addr: Some(format!("0.0.0.0:{}", DEFAULT_LISTEN_PORT)),
            coordinator_endpoint: String::new(),
            peer_endpoints: Vec::new(),
            signing_key_hex: None,
            batch_size: VERIFICATION_BATCH_SIZE,
            batch_refresh_ms: VERIFICATION_BATCH_REFRESH_MS,
            attestation_quorum: DEFAULT_ATTESTATION_QUORUM,
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
        }
    }
}

impl SentinelConfig {
    /// Batch refresh period as a [`Duration`].
    pub fn batch_refresh(&self) -> Duration {
        Duration::from_millis(self.batch_refresh_ms)
    }

    /// Per-peer timeout as a [`Duration`].
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_named_constants() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.batch_size, VERIFICATION_BATCH_SIZE);
        assert_eq!(cfg.batch_refresh_ms, VERIFICATION_BATCH_REFRESH_MS);
        assert_eq!(cfg.attestation_quorum, DEFAULT_ATTESTATION_QUORUM);
        assert_eq!(cfg.peer_timeout_ms, DEFAULT_PEER_TIMEOUT_MS);
    }

    #[test]
    fn duration_helpers() {
        let cfg = SentinelConfig {
            batch_refresh_ms: 250,
            peer_timeout_ms: 2_000,
            ..Default::default()
        };
        assert_eq!(cfg.batch_refresh(), Duration::from_millis(250));
        assert_eq!(cfg.peer_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn json_roundtrip_without_key_material() {
        let cfg = SentinelConfig {
            sentinel_id: 3,
            coordinator_endpoint: "127.0.0.1:7700".to_string(),
            peer_endpoints: vec!["127.0.0.1:7602".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SentinelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sentinel_id, 3);
        assert_eq!(back.peer_endpoints.len(), 1);
        assert!(back.signing_key_hex.is_none());
    }
}

//! Outbound clients: coordinator, peer sentinels, and the client-facing
//! sentinel API used by tools and tests.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

use super::codec::{
    self, CoordinatorRequest, CoordinatorResponse, SentinelRequest, SentinelResponse, WireError,
};
use crate::attestation::{Attestation, AttestationBundle, PeerClient, PeerError};
use crate::config::CONNECT_TIMEOUT_MS;
use crate::coordinator::{CoordinatorClient, CoordinatorError, ExecuteResult};
use crate::transaction::{CompactTransaction, FullTransaction};

/// Dials `endpoint`, sends one request frame, reads one response frame.
async fn roundtrip<Req, Resp>(endpoint: &str, request: &Req) -> Result<Resp, WireError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let dial = TcpStream::connect(endpoint);
    let mut stream = tokio::time::timeout(Duration::from_millis(CONNECT_TIMEOUT_MS), dial)
        .await
        .map_err(|_| {
            WireError::Io(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
        })??;

    codec::write_frame(&mut stream, request).await?;
    codec::read_frame(&mut stream).await
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// TCP client for the coordinator cluster.
#[derive(Debug, Clone)]
pub struct TcpCoordinatorClient {
    endpoint: String,
}

impl TcpCoordinatorClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CoordinatorClient for TcpCoordinatorClient {
    async fn connect(&self) -> bool {
        match roundtrip::<_, CoordinatorResponse>(&self.endpoint, &CoordinatorRequest::Ping).await
        {
            Ok(CoordinatorResponse::Pong) => true,
            Ok(other) => {
                debug!(endpoint = %self.endpoint, ?other, "unexpected reply to coordinator probe");
                false
            }
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "coordinator probe failed");
                false
            }
        }
    }

    async fn execute_compact(&self, ctx: CompactTransaction) -> Result<bool, CoordinatorError> {
        let request = CoordinatorRequest::ExecuteCompact(ctx);
        match roundtrip::<_, CoordinatorResponse>(&self.endpoint, &request).await {
            Ok(CoordinatorResponse::Done(committed)) => Ok(committed),
            Ok(other) => Err(CoordinatorError::Protocol(format!(
                "unexpected coordinator reply: {other:?}"
            ))),
            Err(WireError::Io(e)) => Err(CoordinatorError::Unreachable(e.to_string())),
            Err(e) => Err(CoordinatorError::Protocol(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Peer sentinels
// ---------------------------------------------------------------------------

/// TCP client for one peer sentinel.
#[derive(Debug, Clone)]
pub struct TcpPeerClient {
    endpoint: String,
}

impl TcpPeerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PeerClient for TcpPeerClient {
    async fn connect(&self) -> bool {
        match roundtrip::<_, SentinelResponse>(&self.endpoint, &SentinelRequest::Ping).await {
            Ok(SentinelResponse::Pong) => true,
            Ok(_) | Err(_) => {
                debug!(endpoint = %self.endpoint, "peer probe failed");
                false
            }
        }
    }

    async fn request_attestation(
        &self,
        ctx: CompactTransaction,
    ) -> Result<Option<Attestation>, PeerError> {
        let request = SentinelRequest::Attest(ctx);
        match roundtrip::<_, SentinelResponse>(&self.endpoint, &request).await {
            Ok(SentinelResponse::Attest(attestation)) => Ok(attestation),
            Ok(other) => Err(PeerError::Protocol(format!(
                "unexpected peer reply: {other:?}"
            ))),
            Err(WireError::Io(e)) => Err(PeerError::Unreachable(e.to_string())),
            Err(e) => Err(PeerError::Protocol(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Client-facing API
// ---------------------------------------------------------------------------

/// Client for submitting transactions to a sentinel. This is what wallets,
/// load generators, and the integration tests use.
#[derive(Debug, Clone)]
pub struct SentinelClient {
    endpoint: String,
}

impl SentinelClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Submits a transaction on the commit path and waits for its outcome.
    pub async fn execute(&self, tx: FullTransaction) -> Result<ExecuteResult, WireError> {
        match roundtrip::<_, SentinelResponse>(&self.endpoint, &SentinelRequest::Execute(tx))
            .await?
        {
            SentinelResponse::Execute(result) => Ok(result),
            other => Err(WireError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected sentinel reply: {other:?}"),
            ))),
        }
    }

    /// Submits a transaction on the attestation path and waits for the
    /// gathered bundle.
    pub async fn validate(
        &self,
        tx: FullTransaction,
    ) -> Result<Option<AttestationBundle>, WireError> {
        match roundtrip::<_, SentinelResponse>(&self.endpoint, &SentinelRequest::Validate(tx))
            .await?
        {
            SentinelResponse::Validate(bundle) => Ok(bundle),
            other => Err(WireError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected sentinel reply: {other:?}"),
            ))),
        }
    }
}

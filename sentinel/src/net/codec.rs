//! Wire framing and message shapes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::attestation::{Attestation, AttestationBundle};
use crate::config::MAX_FRAME_BYTES;
use crate::coordinator::ExecuteResult;
use crate::transaction::{CompactTransaction, FullTransaction};

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds the frame size limit")]
    Oversized(usize),

    #[error("malformed frame payload: {0}")]
    Codec(#[from] bincode::Error),
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests a sentinel accepts on its listener. `Attest` is the verb peer
/// sentinels use on each other during attestation gathering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SentinelRequest {
    Execute(FullTransaction),
    Validate(FullTransaction),
    Attest(CompactTransaction),
    Ping,
}

/// One response per request, same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SentinelResponse {
    Execute(ExecuteResult),
    Validate(Option<AttestationBundle>),
    Attest(Option<Attestation>),
    Pong,
}

/// Requests a sentinel sends to the coordinator cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorRequest {
    ExecuteCompact(CompactTransaction),
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorResponse {
    /// `true` means committed, `false` means the coordinator rejected it.
    Done(bool),
    Pong,
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Writes one length-prefixed frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(WireError::Oversized(payload.len()));
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame. Rejects oversized length prefixes before
/// allocating.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::Oversized(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(bincode::deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let request = SentinelRequest::Attest(CompactTransaction {
            tx_id: "ab".repeat(32),
            spent: vec!["cd".repeat(32)],
            created: vec!["ef".repeat(32)],
            proofs: Vec::new(),
        });
        write_frame(&mut a, &request).await.unwrap();

        let decoded: SentinelRequest = read_frame(&mut b).await.unwrap();
        match decoded {
            SentinelRequest::Attest(ctx) => assert_eq!(ctx.tx_id, "ab".repeat(32)),
            other => panic!("wrong verb decoded: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_without_allocation() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let huge = (MAX_FRAME_BYTES as u32 + 1).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &huge).await.unwrap();

        let outcome: Result<SentinelRequest, _> = read_frame(&mut b).await;
        assert!(matches!(outcome, Err(WireError::Oversized(_))));
    }

    #[tokio::test]
    async fn truncated_frame_is_an_io_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut a, &8u32.to_le_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut a, &[1, 2, 3]).await.unwrap();
        drop(a);

        let outcome: Result<SentinelRequest, _> = read_frame(&mut b).await;
        assert!(matches!(outcome, Err(WireError::Io(_))));
    }
}

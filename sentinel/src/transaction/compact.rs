//! Condensed transaction representation.
//!
//! The coordinator and peer sentinels never need the full transaction: the
//! commit protocol operates on unspent-set identifiers, and attestation only
//! needs the content hash and the spend proofs. [`CompactTransaction`] is
//! that minimal, deterministic projection of a [`FullTransaction`].
//!
//! Derivation is pure: the same full transaction always compacts to the same
//! bytes, so compaction can happen on any node and the results agree.

use serde::{Deserialize, Serialize};

use super::types::FullTransaction;
use crate::crypto::double_sha256;

/// Proof that one input of the transaction may be spent: the owning public
/// key and its witness signature over the transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendProof {
    /// Hex-encoded Ed25519 public key of the output owner.
    pub owner_key: String,

    /// Hex-encoded Ed25519 signature over the 32-byte transaction digest.
    pub signature: String,
}

/// The condensed transaction submitted to the coordinator and circulated to
/// peer sentinels for attestation. Read-only once derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTransaction {
    /// Hex-encoded transaction digest (see [`FullTransaction::digest`]).
    pub tx_id: String,

    /// Unspent-set identifiers consumed by this transaction.
    pub spent: Vec<String>,

    /// Unspent-set identifiers created by this transaction.
    pub created: Vec<String>,

    /// One spend proof per input, in input order.
    pub proofs: Vec<SpendProof>,
}

impl CompactTransaction {
    /// Derives the compact form of a full transaction.
    ///
    /// Assumes the witness count matches the input count; callers run static
    /// validation first. A short witness vector produces fewer proofs, which
    /// batch verification will then reject.
    pub fn from_full(tx: &FullTransaction) -> Self {
        let tx_id = tx.id_hex();

        let spent = tx
            .inputs
            .iter()
            .map(|input| {
                let mut preimage = Vec::with_capacity(input.source_tx.len() + 16);
                preimage.extend_from_slice(input.source_tx.as_bytes());
                preimage.extend_from_slice(&input.source_index.to_le_bytes());
                preimage.extend_from_slice(&input.value.to_le_bytes());
                preimage.extend_from_slice(input.owner_key.as_bytes());
                hex::encode(double_sha256(&preimage))
            })
            .collect();

        let created = tx
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let mut preimage = Vec::with_capacity(tx_id.len() + 16);
                preimage.extend_from_slice(tx_id.as_bytes());
                preimage.extend_from_slice(&(index as u32).to_le_bytes());
                preimage.extend_from_slice(&output.value.to_le_bytes());
                preimage.extend_from_slice(output.recipient_key.as_bytes());
                hex::encode(double_sha256(&preimage))
            })
            .collect();

        let proofs = tx
            .inputs
            .iter()
            .zip(tx.witnesses.iter())
            .map(|(input, witness)| SpendProof {
                owner_key: input.owner_key.clone(),
                signature: witness.clone(),
            })
            .collect();

        Self {
            tx_id,
            spent,
            created,
            proofs,
        }
    }

    /// Decodes the transaction id back to its 32 raw bytes, or `None` if the
    /// id field is not 64 hex characters. The id is the message every spend
    /// proof signs, so verification needs the raw form.
    pub fn id_bytes(&self) -> Option<[u8; 32]> {
        let bytes = hex::decode(&self.tx_id).ok()?;
        bytes.as_slice().try_into().ok()
    }
}

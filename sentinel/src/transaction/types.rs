//! Full transaction representation as submitted by clients.
//!
//! A transaction spends a set of previously created outputs and creates new
//! ones. Each input names the transaction and output index it spends, the
//! value being spent, and the public key entitled to spend it; the witnesses
//! are Ed25519 signatures (one per input, same order) over the transaction
//! digest.
//!
//! The digest deliberately excludes the witnesses: signing covers *what* the
//! transaction does, not the signatures themselves.

use serde::{Deserialize, Serialize};

use crate::crypto::{double_sha256, Keypair};

/// One spent output reference inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Hex id of the transaction that created the output being spent.
    pub source_tx: String,

    /// Index of that output within its creating transaction.
    pub source_index: u32,

    /// Value carried by the spent output.
    pub value: u64,

    /// Hex-encoded Ed25519 public key entitled to spend this output.
    pub owner_key: String,
}

/// One newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Value assigned to the new output.
    pub value: u64,

    /// Hex-encoded Ed25519 public key of the recipient.
    pub recipient_key: String,
}

/// The complete transaction as submitted by a client.
///
/// Immutable once accepted into a request; the sentinel never mutates a
/// submitted transaction, it only derives the compact form from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTransaction {
    /// Outputs consumed by this transaction.
    pub inputs: Vec<TxInput>,

    /// Outputs created by this transaction.
    pub outputs: Vec<TxOutput>,

    /// Hex-encoded Ed25519 signatures over [`digest`](Self::digest),
    /// one per input, in input order.
    pub witnesses: Vec<String>,
}

impl FullTransaction {
    /// The canonical byte encoding covered by witness signatures:
    /// the bincode encoding of `(inputs, outputs)`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(&self.inputs, &self.outputs))
            .expect("in-memory transaction encoding cannot fail")
    }

    /// Transaction digest: double SHA-256 of the signable encoding.
    pub fn digest(&self) -> [u8; 32] {
        double_sha256(&self.signable_bytes())
    }

    /// Hex-encoded transaction id.
    pub fn id_hex(&self) -> String {
        hex::encode(self.digest())
    }

    /// Attach witnesses by signing the digest with each input's owner key,
    /// in input order. Replaces any existing witnesses.
    ///
    /// This is the client/wallet side of the contract; the sentinel itself
    /// only ever verifies.
    pub fn attach_witnesses(&mut self, owners: &[&Keypair]) {
        let digest = self.digest();
        self.witnesses = owners.iter().map(|kp| kp.sign_hex(&digest)).collect();
    }
}

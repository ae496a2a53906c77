//! Transaction validation: static structural checks and batched spend-proof
//! verification.
//!
//! Validation is split along the cost boundary the controller cares about:
//!
//! - [`ProofVerifier::check_transaction`] — cheap, synchronous structural
//!   checks, ordered cheapest-first so clearly invalid transactions fail
//!   before any hashing or allocation.
//! - [`ProofVerifier::verify_batch`] — the expensive cryptographic half,
//!   run over a whole flush at once by the batch verifier.
//!
//! Both are pure functions of transaction content: validating the same
//! transaction twice yields the same outcome.

use std::collections::HashSet;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::compact::CompactTransaction;
use super::types::FullTransaction;
use crate::crypto::{parse_signature, parse_verifying_key};

// ---------------------------------------------------------------------------
// ProofError
// ---------------------------------------------------------------------------

/// Why a transaction was rejected. Expected and frequent in steady state:
/// always surfaced to the caller as a failed result, never a crash.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProofError {
    /// The transaction spends nothing.
    #[error("transaction has no inputs")]
    MissingInputs,

    /// The transaction creates nothing.
    #[error("transaction has no outputs")]
    MissingOutputs,

    /// Witness count does not match input count.
    #[error("expected {inputs} witnesses (one per input), got {witnesses}")]
    WitnessCountMismatch { inputs: usize, witnesses: usize },

    /// An input carries no value.
    #[error("input {index} has zero value")]
    ZeroValueInput { index: usize },

    /// An output carries no value.
    #[error("output {index} has zero value")]
    ZeroValueOutput { index: usize },

    /// The same output is spent twice within one transaction.
    #[error("input {index} spends an output already spent by this transaction")]
    DuplicateSpend { index: usize },

    /// Inputs and outputs do not conserve value.
    #[error("value not conserved: inputs total {input_total}, outputs total {output_total}")]
    ValueImbalance {
        input_total: u64,
        output_total: u64,
    },

    /// The compact form's transaction id is not a 32-byte hex digest.
    #[error("malformed transaction id")]
    MalformedTransaction,

    /// An input's owner key is not a valid Ed25519 public key.
    #[error("input {input} has a malformed owner key")]
    MalformedOwnerKey { input: usize },

    /// An input's witness is not a well-formed Ed25519 signature.
    #[error("input {input} has a malformed witness")]
    MalformedWitness { input: usize },

    /// An input's witness does not verify against its owner key.
    #[error("input {input} witness does not verify against its owner key")]
    SignatureMismatch { input: usize },

    /// The verification engine shut down before resolving this entry.
    /// Only observable during process teardown.
    #[error("verification was interrupted before completion")]
    VerificationInterrupted,
}

// ---------------------------------------------------------------------------
// ProofVerifier
// ---------------------------------------------------------------------------

/// The cryptographic validator boundary.
///
/// The controller and batch verifier treat proof checking as a pluggable
/// collaborator with a pass/fail-with-reason contract; [`SpendVerifier`] is
/// the production implementation, and tests substitute their own to force
/// specific outcomes.
pub trait ProofVerifier: Send + Sync {
    /// Static structural validation of a full transaction. `None` means the
    /// transaction is structurally sound and ready for proof verification.
    fn check_transaction(&self, tx: &FullTransaction) -> Option<ProofError>;

    /// Verifies the spend proofs of a whole batch, returning one outcome per
    /// entry in input order. Must be a pure function of the batch contents.
    fn verify_batch(&self, batch: &[CompactTransaction]) -> Vec<Option<ProofError>>;
}

/// Production verifier: structural checks plus amortized Ed25519 batch
/// verification of spend proofs.
///
/// The whole flush's proofs go through `ed25519_dalek::verify_batch` in a
/// single call; only when that aggregate check fails do we pay for per-proof
/// verification to attribute the failure to a specific entry. In the common
/// all-valid case the batch path is substantially cheaper per item than
/// verifying proofs one at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpendVerifier;

impl ProofVerifier for SpendVerifier {
    fn check_transaction(&self, tx: &FullTransaction) -> Option<ProofError> {
        if tx.inputs.is_empty() {
            return Some(ProofError::MissingInputs);
        }
        if tx.outputs.is_empty() {
            return Some(ProofError::MissingOutputs);
        }
        if tx.witnesses.len() != tx.inputs.len() {
            return Some(ProofError::WitnessCountMismatch {
                inputs: tx.inputs.len(),
                witnesses: tx.witnesses.len(),
            });
        }

        for (index, input) in tx.inputs.iter().enumerate() {
            if input.value == 0 {
                return Some(ProofError::ZeroValueInput { index });
            }
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.value == 0 {
                return Some(ProofError::ZeroValueOutput { index });
            }
        }

        let mut seen = HashSet::with_capacity(tx.inputs.len());
        for (index, input) in tx.inputs.iter().enumerate() {
            if !seen.insert((input.source_tx.as_str(), input.source_index)) {
                return Some(ProofError::DuplicateSpend { index });
            }
        }

        // Widen before summing so adversarial values cannot overflow u64.
        let input_total: u128 = tx.inputs.iter().map(|i| u128::from(i.value)).sum();
        let output_total: u128 = tx.outputs.iter().map(|o| u128::from(o.value)).sum();
        if input_total != output_total {
            return Some(ProofError::ValueImbalance {
                input_total: input_total.min(u128::from(u64::MAX)) as u64,
                output_total: output_total.min(u128::from(u64::MAX)) as u64,
            });
        }

        None
    }

    fn verify_batch(&self, batch: &[CompactTransaction]) -> Vec<Option<ProofError>> {
        let mut results: Vec<Option<ProofError>> = vec![None; batch.len()];

        // Parse stage: decode ids, keys, and signatures. Entries that fail
        // here get their error immediately and are excluded from the batch
        // verification pass.
        let mut parsed: Vec<Option<([u8; 32], Vec<(VerifyingKey, Signature)>)>> =
            Vec::with_capacity(batch.len());

        for (i, ctx) in batch.iter().enumerate() {
            let Some(id) = ctx.id_bytes() else {
                results[i] = Some(ProofError::MalformedTransaction);
                parsed.push(None);
                continue;
            };
            if ctx.proofs.is_empty() {
                results[i] = Some(ProofError::MissingInputs);
                parsed.push(None);
                continue;
            }

            let mut pairs = Vec::with_capacity(ctx.proofs.len());
            let mut error = None;
            for (input, proof) in ctx.proofs.iter().enumerate() {
                let Some(key) = parse_verifying_key(&proof.owner_key) else {
                    error = Some(ProofError::MalformedOwnerKey { input });
                    break;
                };
                let Some(sig) = parse_signature(&proof.signature) else {
                    error = Some(ProofError::MalformedWitness { input });
                    break;
                };
                pairs.push((key, sig));
            }

            if let Some(e) = error {
                results[i] = Some(e);
                parsed.push(None);
            } else {
                parsed.push(Some((id, pairs)));
            }
        }

        // Amortized pass: one multi-signature verification over every proof
        // in the flush.
        let mut messages: Vec<&[u8]> = Vec::new();
        let mut signatures: Vec<Signature> = Vec::new();
        let mut keys: Vec<VerifyingKey> = Vec::new();
        for entry in parsed.iter().flatten() {
            for (key, sig) in &entry.1 {
                messages.push(&entry.0);
                signatures.push(*sig);
                keys.push(*key);
            }
        }

        if signatures.is_empty()
            || ed25519_dalek::verify_batch(&messages, &signatures, &keys).is_ok()
        {
            return results;
        }

        // At least one proof in the flush is bad. Fall back to per-proof
        // verification to attribute the failure.
        for (i, entry) in parsed.iter().enumerate() {
            let Some((id, pairs)) = entry else { continue };
            for (input, (key, sig)) in pairs.iter().enumerate() {
                if key.verify(id.as_ref(), sig).is_err() {
                    results[i] = Some(ProofError::SignatureMismatch { input });
                    break;
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::transaction::types::{TxInput, TxOutput};

    /// Builds a balanced, signed single-input transaction.
    fn valid_signed_tx(owner: &Keypair, value: u64, salt: u32) -> FullTransaction {
        let recipient = Keypair::generate();
        let mut tx = FullTransaction {
            inputs: vec![TxInput {
                source_tx: "42".repeat(32),
                source_index: salt,
                value,
                owner_key: owner.public_key_hex(),
            }],
            outputs: vec![TxOutput {
                value,
                recipient_key: recipient.public_key_hex(),
            }],
            witnesses: Vec::new(),
        };
        tx.attach_witnesses(&[owner]);
        tx
    }

    // -- Static checks ------------------------------------------------------

    #[test]
    fn valid_transaction_passes_static_checks() {
        let owner = Keypair::generate();
        let tx = valid_signed_tx(&owner, 100, 0);
        assert_eq!(SpendVerifier.check_transaction(&tx), None);
    }

    #[test]
    fn rejects_empty_inputs() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.inputs.clear();
        tx.witnesses.clear();
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::MissingInputs)
        );
    }

    #[test]
    fn rejects_empty_outputs() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.outputs.clear();
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::MissingOutputs)
        );
    }

    #[test]
    fn rejects_witness_count_mismatch() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.witnesses.clear();
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::WitnessCountMismatch {
                inputs: 1,
                witnesses: 0
            })
        );
    }

    #[test]
    fn rejects_duplicate_spend() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        let dup = tx.inputs[0].clone();
        tx.inputs.push(dup);
        tx.outputs[0].value = 200;
        tx.attach_witnesses(&[&owner, &owner]);
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::DuplicateSpend { index: 1 })
        );
    }

    #[test]
    fn rejects_zero_value_output() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.outputs[0].value = 0;
        tx.attach_witnesses(&[&owner]);
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::ZeroValueOutput { index: 0 })
        );
    }

    #[test]
    fn rejects_value_imbalance() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.outputs[0].value = 90;
        tx.attach_witnesses(&[&owner]);
        assert_eq!(
            SpendVerifier.check_transaction(&tx),
            Some(ProofError::ValueImbalance {
                input_total: 100,
                output_total: 90
            })
        );
    }

    #[test]
    fn static_validation_is_idempotent() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.outputs[0].value = 90;
        let first = SpendVerifier.check_transaction(&tx);
        let second = SpendVerifier.check_transaction(&tx);
        assert_eq!(first, second);
    }

    // -- Batch verification -------------------------------------------------

    fn compact(tx: &FullTransaction) -> CompactTransaction {
        CompactTransaction::from_full(tx)
    }

    #[test]
    fn batch_of_valid_transactions_all_pass() {
        let owner = Keypair::generate();
        let batch: Vec<_> = (0..5)
            .map(|i| compact(&valid_signed_tx(&owner, 100 + i as u64, i)))
            .collect();

        let results = SpendVerifier.verify_batch(&batch);
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(Option::is_none));
    }

    #[test]
    fn corrupted_witness_is_attributed_to_its_entry() {
        let owner = Keypair::generate();
        let good = valid_signed_tx(&owner, 100, 0);
        let mut bad = valid_signed_tx(&owner, 200, 1);
        // Sign the wrong message: a witness over a different digest.
        bad.witnesses[0] = owner.sign_hex(b"wrong message");

        let results = SpendVerifier.verify_batch(&[compact(&good), compact(&bad)]);
        assert_eq!(results[0], None);
        assert_eq!(results[1], Some(ProofError::SignatureMismatch { input: 0 }));
    }

    #[test]
    fn malformed_owner_key_detected_before_batch_pass() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        tx.inputs[0].owner_key = "zz".to_string();
        tx.attach_witnesses(&[&owner]);

        let results = SpendVerifier.verify_batch(&[compact(&tx)]);
        assert_eq!(results[0], Some(ProofError::MalformedOwnerKey { input: 0 }));
    }

    #[test]
    fn malformed_witness_detected_before_batch_pass() {
        let owner = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        let mut ctx = compact(&tx);
        ctx.proofs[0].signature = "aa".to_string();
        tx.attach_witnesses(&[&owner]);

        let results = SpendVerifier.verify_batch(&[ctx]);
        assert_eq!(results[0], Some(ProofError::MalformedWitness { input: 0 }));
    }

    #[test]
    fn malformed_tx_id_rejected() {
        let owner = Keypair::generate();
        let mut ctx = compact(&valid_signed_tx(&owner, 100, 0));
        ctx.tx_id = "short".to_string();

        let results = SpendVerifier.verify_batch(&[ctx]);
        assert_eq!(results[0], Some(ProofError::MalformedTransaction));
    }

    #[test]
    fn empty_batch_yields_empty_results() {
        assert!(SpendVerifier.verify_batch(&[]).is_empty());
    }

    #[test]
    fn wrong_owner_signature_fails() {
        let owner = Keypair::generate();
        let stranger = Keypair::generate();
        let mut tx = valid_signed_tx(&owner, 100, 0);
        // The stranger signs instead of the owner the input names.
        tx.attach_witnesses(&[&stranger]);

        let results = SpendVerifier.verify_batch(&[compact(&tx)]);
        assert_eq!(results[0], Some(ProofError::SignatureMismatch { input: 0 }));
    }
}

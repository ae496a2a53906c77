//! Transaction types and verification.
//!
//! - [`types`] — the full client-submitted transaction.
//! - [`compact`] — the condensed form sent to the coordinator and peers.
//! - [`validation`] — static checks and the batched spend-proof verifier.

pub mod compact;
pub mod types;
pub mod validation;

pub use compact::{CompactTransaction, SpendProof};
pub use types::{FullTransaction, TxInput, TxOutput};
pub use validation::{ProofError, ProofVerifier, SpendVerifier};

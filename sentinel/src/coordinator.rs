//! # Coordinator Submission
//!
//! Hands verified compact transactions to the commit coordinator and
//! translates its answer into the caller-facing execution result.
//!
//! The submitter has no retry policy. The coordinator protocol is
//! at-most-once from the sentinel's point of view: an unreachable
//! coordinator surfaces as [`ExecuteResult::Unreachable`] and the client
//! decides whether to resubmit.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transaction::{CompactTransaction, ProofError};

/// Final outcome of an execute request, delivered exactly once per accepted
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecuteResult {
    /// The coordinator committed the transaction.
    Confirmed,

    /// The coordinator ran two-phase commit and rejected it, typically for
    /// spending identifiers that are not in the unspent set.
    Rejected,

    /// The coordinator could not be reached; the transaction's fate is
    /// unknown and the client may resubmit.
    Unreachable,

    /// The transaction never left this sentinel.
    Invalid(ProofError),
}

/// Errors from a coordinator interaction.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator unreachable: {0}")]
    Unreachable(String),

    #[error("coordinator protocol error: {0}")]
    Protocol(String),
}

/// A connection to the commit coordinator.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    /// Probes reachability. Used once at startup; `false` fails sentinel
    /// initialization.
    async fn connect(&self) -> bool;

    /// Runs the transaction through two-phase commit. `Ok(true)` means
    /// committed, `Ok(false)` means the coordinator rejected it.
    async fn execute_compact(&self, ctx: CompactTransaction) -> Result<bool, CoordinatorError>;
}

/// Thin submission layer over the [`CoordinatorClient`], owning the
/// response translation.
pub struct Submitter {
    coordinator: Arc<dyn CoordinatorClient>,
}

impl Submitter {
    pub fn new(coordinator: Arc<dyn CoordinatorClient>) -> Self {
        Self { coordinator }
    }

    /// Submits a verified compact transaction and returns the translated
    /// outcome. Never returns [`ExecuteResult::Invalid`]; validity was
    /// settled before submission.
    pub async fn send_compact_tx(&self, ctx: CompactTransaction) -> ExecuteResult {
        let tx_id = ctx.tx_id.clone();
        match self.coordinator.execute_compact(ctx).await {
            Ok(true) => {
                debug!(%tx_id, "coordinator confirmed transaction");
                ExecuteResult::Confirmed
            }
            Ok(false) => {
                debug!(%tx_id, "coordinator rejected transaction");
                ExecuteResult::Rejected
            }
            Err(e) => {
                warn!(%tx_id, error = %e, "coordinator submission failed");
                ExecuteResult::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Accept,
        Reject,
        Fail,
    }

    struct ScriptedCoordinator {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl ScriptedCoordinator {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CoordinatorClient for ScriptedCoordinator {
        async fn connect(&self) -> bool {
            true
        }

        async fn execute_compact(
            &self,
            _ctx: CompactTransaction,
        ) -> Result<bool, CoordinatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Accept => Ok(true),
                Reply::Reject => Ok(false),
                Reply::Fail => Err(CoordinatorError::Unreachable("timed out".into())),
            }
        }
    }

    fn ctx() -> CompactTransaction {
        CompactTransaction {
            tx_id: "00".repeat(32),
            spent: vec!["11".repeat(32)],
            created: vec!["22".repeat(32)],
            proofs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn acceptance_translates_to_confirmed() {
        let coordinator = ScriptedCoordinator::new(Reply::Accept);
        let submitter = Submitter::new(coordinator.clone());

        assert_eq!(submitter.send_compact_tx(ctx()).await, ExecuteResult::Confirmed);
        assert_eq!(coordinator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_translates_to_rejected() {
        let submitter = Submitter::new(ScriptedCoordinator::new(Reply::Reject));
        assert_eq!(submitter.send_compact_tx(ctx()).await, ExecuteResult::Rejected);
    }

    #[tokio::test]
    async fn transport_failure_translates_to_unreachable_without_retry() {
        let coordinator = ScriptedCoordinator::new(Reply::Fail);
        let submitter = Submitter::new(coordinator.clone());

        assert_eq!(
            submitter.send_compact_tx(ctx()).await,
            ExecuteResult::Unreachable
        );
        // No retry policy at this layer.
        assert_eq!(coordinator.calls.load(Ordering::SeqCst), 1);
    }
}

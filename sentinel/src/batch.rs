//! # Batch Verifier
//!
//! Accumulates transactions awaiting spend-proof verification and flushes
//! them through the [`ProofVerifier`] in bulk, amortizing the cryptographic
//! cost across a whole batch.
//!
//! A flush fires when either trigger arms:
//!
//! - the buffer reaches the configured batch size, or
//! - the refresh timer ticks (when timing is enabled).
//!
//! Each submitted transaction carries a one-shot result slot; the submitter
//! suspends on its slot until some flush resolves it. Resolution is
//! exactly-once per entry and independent of every other entry in the batch.
//!
//! With timing disabled, a buffer that never reaches the batch size is never
//! flushed and its submitters stay suspended until [`BatchVerifier::flush`]
//! is called or the engine is dropped. Callers that accept trickle traffic
//! must keep the timer running.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::transaction::{CompactTransaction, ProofError, ProofVerifier};

/// One buffered transaction and the slot its submitter is waiting on.
struct PendingVerification {
    ctx: CompactTransaction,
    slot: oneshot::Sender<Option<ProofError>>,
}

/// State shared between callers and the refresh-timer task.
struct Inner {
    verifier: Arc<dyn ProofVerifier>,
    pending: Mutex<Vec<PendingVerification>>,
    batch_size: usize,
    refresh: Duration,
}

impl Inner {
    fn flush(&self) -> usize {
        let entries = std::mem::take(&mut *self.pending.lock());
        if entries.is_empty() {
            trace!("flush on empty buffer, nothing to do");
            return 0;
        }

        let count = entries.len();
        let (ctxs, slots): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|entry| (entry.ctx, entry.slot))
            .unzip();

        let results = self.verifier.verify_batch(&ctxs);
        debug_assert_eq!(results.len(), count);

        let mut rejected = 0usize;
        for (slot, outcome) in slots.into_iter().zip(results) {
            if outcome.is_some() {
                rejected += 1;
            }
            // A closed slot means the submitter went away; nothing to do.
            let _ = slot.send(outcome);
        }

        debug!(entries = count, rejected, "verified batch");
        count
    }
}

struct TimerHandle {
    stop: watch::Sender<bool>,
}

/// Shared verification engine. One per sentinel; every request path that
/// needs proof verification funnels through the same instance so batches
/// actually fill.
pub struct BatchVerifier {
    inner: Arc<Inner>,
    timer: Mutex<Option<TimerHandle>>,
}

impl BatchVerifier {
    /// Creates an engine flushing at `batch_size` entries, with a periodic
    /// flush every `refresh` once [`start_timing`](Self::start_timing) runs.
    pub fn new(verifier: Arc<dyn ProofVerifier>, batch_size: usize, refresh: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                verifier,
                pending: Mutex::new(Vec::new()),
                batch_size: batch_size.max(1),
                refresh,
            }),
            timer: Mutex::new(None),
        }
    }

    /// The configured flush threshold.
    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    /// Number of entries currently buffered.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Submits one transaction for verification and suspends until a flush
    /// resolves it. `None` means the proofs verified.
    ///
    /// If the submission fills the buffer to the batch size, this call
    /// performs the flush itself before awaiting, so a full batch never
    /// waits on the timer.
    pub async fn add(&self, ctx: CompactTransaction) -> Option<ProofError> {
        let (slot, result) = oneshot::channel();

        let should_flush = {
            let mut pending = self.inner.pending.lock();
            pending.push(PendingVerification { ctx, slot });
            pending.len() >= self.inner.batch_size
        };
        if should_flush {
            self.inner.flush();
        }

        match result.await {
            Ok(outcome) => outcome,
            // The engine dropped the buffer without verifying, which only
            // happens during teardown.
            Err(_) => Some(ProofError::VerificationInterrupted),
        }
    }

    /// Flushes the current buffer through the verifier, resolving every
    /// buffered slot. An empty buffer is a no-op. Returns the number of
    /// entries verified.
    ///
    /// The buffer is swapped out under the lock, so transactions submitted
    /// while verification runs land in a fresh buffer for the next flush.
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Starts the periodic flush timer. Idempotent: a second call while the
    /// timer runs is a no-op.
    pub fn start_timing(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.flush();
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            trace!("batch refresh timer stopped");
        });

        *timer = Some(TimerHandle { stop });
        debug!(
            refresh_ms = self.inner.refresh.as_millis() as u64,
            "batch refresh timer started"
        );
    }

    /// Stops the periodic flush timer. Idempotent. Entries already buffered
    /// stay buffered; stopping the timer only removes the periodic trigger.
    pub fn stop_timing(&self) {
        if let Some(handle) = self.timer.lock().take() {
            let _ = handle.stop.send(true);
        }
    }

    /// Whether the refresh timer is currently running.
    pub fn timing_enabled(&self) -> bool {
        self.timer.lock().is_some()
    }
}

impl std::fmt::Debug for BatchVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchVerifier")
            .field("batch_size", &self.inner.batch_size)
            .field("refresh", &self.inner.refresh)
            .field("pending", &self.pending_len())
            .field("timing", &self.timing_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::time::Duration;

    /// Test verifier that records flush sizes and rejects any transaction
    /// whose id matches a configured value.
    struct ScriptedVerifier {
        flush_sizes: PlMutex<Vec<usize>>,
        reject_id: Option<String>,
    }

    impl ScriptedVerifier {
        fn accepting() -> Self {
            Self {
                flush_sizes: PlMutex::new(Vec::new()),
                reject_id: None,
            }
        }

        fn rejecting(id: &str) -> Self {
            Self {
                flush_sizes: PlMutex::new(Vec::new()),
                reject_id: Some(id.to_string()),
            }
        }
    }

    impl ProofVerifier for ScriptedVerifier {
        fn check_transaction(
            &self,
            _tx: &crate::transaction::FullTransaction,
        ) -> Option<ProofError> {
            None
        }

        fn verify_batch(&self, batch: &[CompactTransaction]) -> Vec<Option<ProofError>> {
            self.flush_sizes.lock().push(batch.len());
            batch
                .iter()
                .map(|ctx| {
                    if Some(&ctx.tx_id) == self.reject_id.as_ref() {
                        Some(ProofError::SignatureMismatch { input: 0 })
                    } else {
                        None
                    }
                })
                .collect()
        }
    }

    fn ctx(id: &str) -> CompactTransaction {
        CompactTransaction {
            tx_id: id.to_string(),
            spent: Vec::new(),
            created: Vec::new(),
            proofs: Vec::new(),
        }
    }

    // -------------------------------------------------------------------
    // 1. Size-triggered flushes
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn filling_the_buffer_flushes_without_a_timer() {
        let verifier = Arc::new(ScriptedVerifier::accepting());
        let engine = Arc::new(BatchVerifier::new(
            verifier.clone(),
            3,
            Duration::from_secs(3600),
        ));

        let mut tasks = Vec::new();
        for i in 0..3 {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(
                async move { engine.add(ctx(&format!("tx-{i}"))).await },
            ));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), None);
        }

        assert_eq!(*verifier.flush_sizes.lock(), vec![3]);
        assert_eq!(engine.pending_len(), 0);
    }

    #[tokio::test]
    async fn below_threshold_submission_stays_pending() {
        let engine = Arc::new(BatchVerifier::new(
            Arc::new(ScriptedVerifier::accepting()),
            10,
            Duration::from_secs(3600),
        ));

        let waiter = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.add(ctx("lonely")).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(engine.pending_len(), 1);

        // Manual flush releases it.
        assert_eq!(engine.flush(), 1);
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn each_entry_gets_its_own_result() {
        let engine = Arc::new(BatchVerifier::new(
            Arc::new(ScriptedVerifier::rejecting("bad")),
            2,
            Duration::from_secs(3600),
        ));

        let good = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.add(ctx("good")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let bad = engine.add(ctx("bad")).await;

        assert_eq!(good.await.unwrap(), None);
        assert_eq!(bad, Some(ProofError::SignatureMismatch { input: 0 }));
    }

    // -------------------------------------------------------------------
    // 2. Timer-triggered flushes
    // -------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn refresh_timer_flushes_a_partial_batch() {
        let verifier = Arc::new(ScriptedVerifier::accepting());
        let engine = BatchVerifier::new(verifier.clone(), 100, Duration::from_millis(250));
        engine.start_timing();

        let outcome = engine.add(ctx("trickle")).await;
        assert_eq!(outcome, None);
        assert_eq!(*verifier.flush_sizes.lock(), vec![1]);

        engine.stop_timing();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_start_and_stop_are_idempotent() {
        let engine = BatchVerifier::new(
            Arc::new(ScriptedVerifier::accepting()),
            100,
            Duration::from_millis(250),
        );

        assert!(!engine.timing_enabled());
        engine.start_timing();
        engine.start_timing();
        assert!(engine.timing_enabled());

        engine.stop_timing();
        engine.stop_timing();
        assert!(!engine.timing_enabled());
    }

    // -------------------------------------------------------------------
    // 3. Flush edge cases
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn flush_on_empty_buffer_is_a_no_op() {
        let verifier = Arc::new(ScriptedVerifier::accepting());
        let engine = BatchVerifier::new(verifier.clone(), 10, Duration::from_secs(3600));

        assert_eq!(engine.flush(), 0);
        assert!(verifier.flush_sizes.lock().is_empty());
    }

    #[tokio::test]
    async fn submissions_during_a_flush_land_in_the_next_batch() {
        let verifier = Arc::new(ScriptedVerifier::accepting());
        let engine = Arc::new(BatchVerifier::new(
            verifier.clone(),
            2,
            Duration::from_secs(3600),
        ));

        // First full batch.
        let a = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.add(ctx("a")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.add(ctx("b")).await;
        a.await.unwrap();

        // Second full batch, fresh buffer.
        let c = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.add(ctx("c")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.add(ctx("d")).await;
        c.await.unwrap();

        assert_eq!(*verifier.flush_sizes.lock(), vec![2, 2]);
    }
}

//! Promotion to the authoritative ledger.
//!
//! [`should_promote`] is the policy: a pure predicate on a record.
//! [`PromotionQueue`] is the mechanism: a bounded outbound queue drained by
//! one background worker, so ledger latency never reaches the append path.
//!
//! Promotion is fire-and-forget. A full queue drops the entry; a failed
//! commit is logged and counted. Neither is retried here and neither rolls
//! back the local append that caused it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ledger::{AuthoritativeLedger, LedgerEntry};
use crate::memory::MemoryRecord;
use crate::types::Address;

/// Records strictly above this significance are promoted.
pub const PROMOTION_THRESHOLD: u8 = 70;

/// Whether a record is committed to the authoritative ledger.
#[must_use]
pub fn should_promote(record: &MemoryRecord) -> bool {
    record.significance > PROMOTION_THRESHOLD
}

/// Counters for the promotion pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionStats {
    /// Entries accepted into the queue.
    pub submitted: u64,
    /// Entries rejected because the queue was full or closed.
    pub dropped: u64,
    /// Entries the ledger accepted.
    pub committed: u64,
    /// Entries the ledger rejected or failed to store.
    pub failed: u64,
}

impl PromotionStats {
    /// Entries accepted but not yet resolved by the worker.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.committed)
            .saturating_sub(self.failed)
    }
}

/// Bounded queue plus the worker that commits its entries.
pub struct PromotionQueue {
    sender: Mutex<Option<mpsc::Sender<LedgerEntry>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<Mutex<PromotionStats>>,
    controller: Address,
}

impl std::fmt::Debug for PromotionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionQueue")
            .field("controller", &self.controller)
            .field("open", &self.sender.lock().is_some())
            .field("stats", &*self.stats.lock())
            .finish_non_exhaustive()
    }
}

impl PromotionQueue {
    /// Start the worker on the current tokio runtime.
    ///
    /// Entries are committed as `controller`. `capacity` bounds the number
    /// of entries waiting for the worker (minimum one).
    #[must_use]
    pub fn spawn(ledger: Arc<dyn AuthoritativeLedger>, controller: Address, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(Mutex::new(PromotionStats::default()));
        let worker = tokio::spawn(run_worker(rx, ledger, controller, Arc::clone(&stats)));
        Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            stats,
            controller,
        }
    }

    /// Hand an entry to the worker without waiting.
    ///
    /// Returns `false` if it was dropped because the queue is full or has
    /// been shut down.
    pub fn submit(&self, entry: LedgerEntry) -> bool {
        let agent = entry.agent();
        let sent = match self.sender.lock().as_ref() {
            Some(tx) => tx.try_send(entry).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            }),
            None => Err("queue shut down"),
        };
        let mut stats = self.stats.lock();
        match sent {
            Ok(()) => {
                stats.submitted += 1;
                true
            }
            Err(reason) => {
                stats.dropped += 1;
                warn!(agent = %agent, reason, "Promotion dropped");
                false
            }
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PromotionStats {
        *self.stats.lock()
    }

    /// Close the queue and wait until every accepted entry has been
    /// attempted. Later submissions are dropped. Calling twice is harmless.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                warn!(error = %e, "Promotion worker ended abnormally");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<LedgerEntry>,
    ledger: Arc<dyn AuthoritativeLedger>,
    controller: Address,
    stats: Arc<Mutex<PromotionStats>>,
) {
    while let Some(entry) = rx.recv().await {
        let agent = entry.agent();
        let kind = entry.kind_name();
        match ledger.commit(controller, entry).await {
            Ok(receipt) => {
                stats.lock().committed += 1;
                debug!(agent = %agent, kind, sequence = receipt.sequence, "Promoted to ledger");
            }
            Err(e) => {
                stats.lock().failed += 1;
                warn!(agent = %agent, kind, error = %e, "Promotion failed");
            }
        }
    }
    debug!("Promotion worker stopped");
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::ledger::{LedgerError, LedgerReceipt, LedgerResult, PromotedMemory};
    use crate::memory::MemoryDraft;
    use crate::types::{AgentId, MemoryKind};

    #[derive(Default)]
    struct CountingLedger {
        committed: Mutex<Vec<LedgerEntry>>,
        reject: bool,
    }

    #[async_trait]
    impl AuthoritativeLedger for CountingLedger {
        async fn commit(&self, controller: Address, entry: LedgerEntry) -> LedgerResult<LedgerReceipt> {
            if self.reject {
                return Err(LedgerError::Unauthorized {
                    agent: entry.agent(),
                    controller,
                });
            }
            let mut committed = self.committed.lock();
            committed.push(entry);
            Ok(LedgerReceipt {
                sequence: committed.len() as u64,
                hash: String::new(),
            })
        }

        async fn entries(&self, agent: AgentId) -> LedgerResult<Vec<LedgerEntry>> {
            Ok(self
                .committed
                .lock()
                .iter()
                .filter(|e| e.agent() == agent)
                .cloned()
                .collect())
        }
    }

    fn record(significance: i64) -> MemoryRecord {
        MemoryDraft::new(MemoryKind::Event, "a thing happened")
            .with_significance(significance)
            .into_record(0, Utc::now())
            .expect("valid")
    }

    fn entry(agent: u64) -> LedgerEntry {
        LedgerEntry::Memory(PromotedMemory::from_record(AgentId(agent), &record(90)))
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!should_promote(&record(70)));
        assert!(should_promote(&record(71)));
        assert!(should_promote(&record(100)));
        assert!(!should_promote(&record(0)));
    }

    #[tokio::test]
    async fn shutdown_drains_accepted_entries() {
        let ledger = Arc::new(CountingLedger::default());
        let queue = PromotionQueue::spawn(ledger.clone(), Address::from_low_u64(1), 16);
        for agent in 0..5 {
            assert!(queue.submit(entry(agent)));
        }
        queue.shutdown().await;
        let stats = queue.stats();
        assert_eq!(stats.submitted, 5);
        assert_eq!(stats.committed, 5);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(ledger.committed.lock().len(), 5);

        assert!(!queue.submit(entry(9)));
        assert_eq!(queue.stats().dropped, 1);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_commits_are_counted_not_retried() {
        let ledger = Arc::new(CountingLedger {
            reject: true,
            ..CountingLedger::default()
        });
        let queue = PromotionQueue::spawn(ledger, Address::from_low_u64(1), 4);
        assert!(queue.submit(entry(1)));
        assert!(queue.submit(entry(2)));
        queue.shutdown().await;
        let stats = queue.stats();
        assert_eq!((stats.committed, stats.failed), (0, 2));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops() {
        let ledger = Arc::new(CountingLedger::default());
        let queue = PromotionQueue::spawn(ledger, Address::from_low_u64(1), 1);
        // The worker cannot run until we yield, so the second send finds the
        // single slot occupied.
        assert!(queue.submit(entry(1)));
        assert!(!queue.submit(entry(2)));
        queue.shutdown().await;
        let stats = queue.stats();
        assert_eq!((stats.submitted, stats.dropped, stats.committed), (1, 1, 1));
    }
}

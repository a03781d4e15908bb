//! Ordered chain of durable tiers.
//!
//! Reads walk the chain until the first hit and backfill the tiers in
//! front of it. Writes fan out to every available tier. A tier that fails
//! is marked unavailable and skipped until it passes a probe again; probes
//! are retried lazily, no more often than the configured interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{StoreKey, Tier, TierError};

/// What happened to one tier during a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The tier stored the value.
    Written,
    /// The tier was unavailable and not attempted.
    Skipped,
    /// The tier was attempted and failed.
    Failed(String),
}

/// Per-tier acknowledgement of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAck {
    /// Tier name.
    pub tier: String,
    /// Outcome for that tier.
    pub outcome: AckOutcome,
}

/// Acknowledgements for one fan-out write, in chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteAcks(pub Vec<TierAck>);

impl WriteAcks {
    /// Number of tiers that stored the value.
    #[must_use]
    pub fn written(&self) -> usize {
        self.0
            .iter()
            .filter(|a| a.outcome == AckOutcome::Written)
            .count()
    }

    /// Outcome for a named tier, if it is part of the chain.
    #[must_use]
    pub fn outcome(&self, tier: &str) -> Option<&AckOutcome> {
        self.0.iter().find(|a| a.tier == tier).map(|a| &a.outcome)
    }
}

/// Result of looking a key up across the chain.
///
/// `Absent` and `Unreachable` differ in what the caller may conclude:
/// only `Absent` means the value does not exist in durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// A tier returned the value.
    Found(T),
    /// At least one tier answered and none held the value, or the chain
    /// is empty.
    Absent,
    /// No tier could be asked.
    Unreachable,
}

impl<T> Lookup<T> {
    /// The value, if one was found.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Absent | Self::Unreachable => None,
        }
    }

    /// Whether durable storage answered, with or without a value.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unreachable)
    }

    /// Transform a found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(value) => Lookup::Found(f(value)),
            Self::Absent => Lookup::Absent,
            Self::Unreachable => Lookup::Unreachable,
        }
    }
}

struct TierSlot {
    tier: Arc<dyn Tier>,
    available: AtomicBool,
    last_probe: Mutex<Option<Instant>>,
}

impl TierSlot {
    fn name(&self) -> &str {
        self.tier.name()
    }

    fn fail(&self, key: &str, err: &TierError) {
        match err {
            TierError::Unavailable(_) | TierError::Database(_) => {
                if self.available.swap(false, Ordering::SeqCst) {
                    warn!(tier = self.name(), key, error = %err, "Tier marked unavailable");
                }
            }
            TierError::Serialization(_) => {
                warn!(tier = self.name(), key, error = %err, "Tier returned undecodable value");
            }
        }
    }
}

/// The durable part of the storage chain, highest priority first.
pub struct TierChain {
    slots: Vec<TierSlot>,
    reprobe_interval: Duration,
}

impl std::fmt::Debug for TierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.slots.iter().map(TierSlot::name).collect();
        f.debug_struct("TierChain")
            .field("tiers", &names)
            .field("reprobe_interval", &self.reprobe_interval)
            .finish()
    }
}

impl TierChain {
    /// Build a chain from tiers in priority order. Tiers start out
    /// unprobed; call [`TierChain::probe_all`] before first use.
    #[must_use]
    pub fn new(tiers: Vec<Arc<dyn Tier>>, reprobe_interval: Duration) -> Self {
        let slots = tiers
            .into_iter()
            .map(|tier| TierSlot {
                tier,
                available: AtomicBool::new(false),
                last_probe: Mutex::new(None),
            })
            .collect();
        Self {
            slots,
            reprobe_interval,
        }
    }

    /// An empty chain: only the in-process arena holds state.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    /// Number of configured tiers, available or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no durable tier is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Probe every tier now and record availability.
    pub async fn probe_all(&self) {
        for slot in &self.slots {
            self.probe_slot(slot).await;
        }
    }

    /// Names of the tiers currently considered available.
    #[must_use]
    pub fn available_tiers(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.available.load(Ordering::SeqCst))
            .map(|s| s.name().to_string())
            .collect()
    }

    async fn probe_slot(&self, slot: &TierSlot) -> bool {
        *slot.last_probe.lock() = Some(Instant::now());
        match slot.tier.probe().await {
            Ok(()) => {
                if !slot.available.swap(true, Ordering::SeqCst) {
                    info!(tier = slot.name(), "Tier available");
                }
                true
            }
            Err(e) => {
                slot.available.store(false, Ordering::SeqCst);
                warn!(tier = slot.name(), error = %e, "Tier probe failed");
                false
            }
        }
    }

    /// Whether a slot may be used, re-probing it if it is down and the
    /// reprobe interval has elapsed.
    async fn ready(&self, slot: &TierSlot) -> bool {
        if slot.available.load(Ordering::SeqCst) {
            return true;
        }
        let due = slot
            .last_probe
            .lock()
            .is_none_or(|at| at.elapsed() >= self.reprobe_interval);
        if due {
            self.probe_slot(slot).await
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Read a record from the first tier that has it, backfilling the
    /// tiers in front of the hit.
    pub async fn read(&self, key: &StoreKey) -> Lookup<Vec<u8>> {
        let key_str = key.to_string();
        let mut answered = self.slots.is_empty();
        for (idx, slot) in self.slots.iter().enumerate() {
            if !self.ready(slot).await {
                continue;
            }
            match slot.tier.get(&key_str).await {
                Ok(Some(bytes)) => {
                    debug!(tier = slot.name(), key = %key_str, "Tier hit");
                    self.backfill(&self.slots[..idx], &key_str, &bytes).await;
                    return Lookup::Found(bytes);
                }
                Ok(None) => answered = true,
                Err(e) => slot.fail(&key_str, &e),
            }
        }
        self.miss(answered, &key_str)
    }

    fn miss<T>(&self, answered: bool, key: &str) -> Lookup<T> {
        if answered {
            Lookup::Absent
        } else {
            debug!(key, tiers = self.slots.len(), "No tier answered");
            Lookup::Unreachable
        }
    }

    async fn backfill(&self, ahead: &[TierSlot], key: &str, bytes: &[u8]) {
        for slot in ahead {
            if !self.ready(slot).await {
                continue;
            }
            if let Err(e) = slot.tier.put(key, bytes).await {
                slot.fail(key, &e);
            }
        }
    }

    /// Write a record to every available tier.
    pub async fn write(&self, key: &StoreKey, bytes: &[u8]) -> WriteAcks {
        let key_str = key.to_string();
        let mut acks = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let outcome = if self.ready(slot).await {
                match slot.tier.put(&key_str, bytes).await {
                    Ok(()) => AckOutcome::Written,
                    Err(e) => {
                        slot.fail(&key_str, &e);
                        AckOutcome::Failed(e.to_string())
                    }
                }
            } else {
                AckOutcome::Skipped
            };
            acks.push(TierAck {
                tier: slot.name().to_string(),
                outcome,
            });
        }
        WriteAcks(acks)
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Prepend a list entry in every available tier.
    pub async fn push(&self, key: &StoreKey, bytes: &[u8]) -> WriteAcks {
        let key_str = key.to_string();
        let mut acks = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let outcome = if self.ready(slot).await {
                match slot.tier.push(&key_str, bytes).await {
                    Ok(()) => AckOutcome::Written,
                    Err(e) => {
                        slot.fail(&key_str, &e);
                        AckOutcome::Failed(e.to_string())
                    }
                }
            } else {
                AckOutcome::Skipped
            };
            acks.push(TierAck {
                tier: slot.name().to_string(),
                outcome,
            });
        }
        WriteAcks(acks)
    }

    /// Newest-first entries from the first tier returning a non-empty list.
    /// Tiers are not merged.
    pub async fn range(&self, key: &StoreKey, count: usize) -> Lookup<Vec<Vec<u8>>> {
        let key_str = key.to_string();
        let mut answered = self.slots.is_empty();
        for slot in &self.slots {
            if !self.ready(slot).await {
                continue;
            }
            match slot.tier.range(&key_str, count).await {
                Ok(entries) if !entries.is_empty() => {
                    debug!(tier = slot.name(), key = %key_str, n = entries.len(), "List hit");
                    return Lookup::Found(entries);
                }
                Ok(_) => answered = true,
                Err(e) => slot.fail(&key_str, &e),
            }
        }
        self.miss(answered, &key_str)
    }
}

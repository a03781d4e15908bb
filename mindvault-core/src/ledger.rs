//! Interface to the authoritative ledger tier.
//!
//! The ledger is append-only and externally verifiable. It is written only
//! for promoted memories and personality snapshots, never read on the hot
//! path. Writes require the agent-controller capability; reads are open.
//!
//! The concrete hash-chained implementation lives in the `mindvault-ledger`
//! crate. This module only defines the seam so the core never depends on a
//! particular ledger backend.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryRecord;
use crate::personality::PersonalityProfile;
use crate::types::{Address, AgentId, MemoryKind, Polarity, TraitVector};

/// Errors from the authoritative ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The caller does not hold the controller capability for the agent.
    #[error("Address {controller} is not a controller of agent {agent}")]
    Unauthorized {
        /// Agent whose entry was being written.
        agent: AgentId,
        /// Address that attempted the write.
        controller: Address,
    },

    /// A different memory is already recorded under this id.
    #[error("Memory {memory_id} of agent {agent} is already recorded with other content")]
    Conflict {
        /// Owning agent.
        agent: AgentId,
        /// The reused memory id.
        memory_id: u64,
    },

    /// The ledger backend cannot be reached.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The backend failed while storing or reading.
    #[error("Ledger storage error: {0}")]
    Storage(String),

    /// An entry could not be encoded or decoded.
    #[error("Ledger serialization error: {0}")]
    Serialization(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// An immutable ledger copy of a promoted memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedMemory {
    /// Owning agent.
    pub agent: AgentId,
    /// Id of the memory in the agent's log.
    pub memory_id: u64,
    /// The other party, if any.
    pub counterpart: Option<Address>,
    /// Event category.
    pub kind: MemoryKind,
    /// Opaque payload.
    pub content: String,
    /// Importance in `[0, 100]`.
    pub significance: u8,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Good or bad for the agent.
    pub polarity: Polarity,
    /// When the memory was recorded locally.
    pub timestamp: DateTime<Utc>,
}

impl PromotedMemory {
    /// Copy a local record into its ledger form.
    #[must_use]
    pub fn from_record(agent: AgentId, record: &MemoryRecord) -> Self {
        Self {
            agent,
            memory_id: record.id,
            counterpart: record.counterpart,
            kind: record.kind,
            content: record.content.clone(),
            significance: record.significance,
            tags: record.tags.clone(),
            polarity: record.polarity,
            timestamp: record.timestamp,
        }
    }
}

/// An immutable ledger copy of a personality at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Owning agent.
    pub agent: AgentId,
    /// Trait values at snapshot time.
    pub traits: TraitVector,
    /// Biography.
    pub backstory: String,
    /// Quirks, in author order.
    pub quirks: Vec<String>,
    /// Profile timestamp at snapshot time.
    pub taken_at: DateTime<Utc>,
}

impl From<&PersonalityProfile> for ProfileSnapshot {
    fn from(profile: &PersonalityProfile) -> Self {
        Self {
            agent: profile.agent,
            traits: profile.traits,
            backstory: profile.backstory.clone(),
            quirks: profile.quirks.clone(),
            taken_at: profile.last_updated,
        }
    }
}

/// Something committed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// A promoted episodic memory.
    Memory(PromotedMemory),
    /// A promoted personality snapshot.
    ProfileSnapshot(ProfileSnapshot),
}

impl LedgerEntry {
    /// Agent the entry belongs to.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        match self {
            Self::Memory(m) => m.agent,
            Self::ProfileSnapshot(p) => p.agent,
        }
    }

    /// Short kind name stored alongside the payload.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::ProfileSnapshot(_) => "profile_snapshot",
        }
    }
}

/// Proof that an entry was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Position in the ledger, starting at one.
    pub sequence: u64,
    /// Hex-encoded hash linking the entry into the ledger.
    pub hash: String,
}

/// An append-only, externally verifiable ledger.
#[async_trait]
pub trait AuthoritativeLedger: Send + Sync {
    /// Append `entry` on behalf of `controller`.
    ///
    /// Implementations may treat a repeated commit of the same memory as a
    /// no-op and return the original receipt.
    async fn commit(&self, controller: Address, entry: LedgerEntry) -> LedgerResult<LedgerReceipt>;

    /// All entries recorded for `agent`, oldest first. Open to any caller.
    async fn entries(&self, agent: AgentId) -> LedgerResult<Vec<LedgerEntry>>;
}

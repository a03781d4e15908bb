//! Storage tiers behind the in-process arena.
//!
//! Every durable backing store implements [`Tier`], a uniform byte-level
//! interface with two shapes of data:
//!
//! - **records** (`get` / `put`): personality profiles and relationships,
//!   last-writer-wins per key;
//! - **lists** (`push` / `range`): episodic memories, newest-first. A tier
//!   may bound its own list view (the cache does) or keep everything (the
//!   relational store does).
//!
//! [`TierChain`] orders the tiers and turns individual failures into
//! skipped tiers instead of failed operations.
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐        ┌────────────┐
//! │ in-process │───▶│   cache    │───▶│   sqlite   │  ···▶  │   ledger   │
//! │  (arena)   │    │ (lru view) │    │ (history)  │        │ (promoted) │
//! └────────────┘    └────────────┘    └────────────┘        └────────────┘
//! ```

pub mod cache;
pub mod chain;
pub mod sqlite;

pub use cache::CacheTier;
pub use chain::{AckOutcome, Lookup, TierAck, TierChain, WriteAcks};
pub use sqlite::SqliteTier;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Address, AgentId};

/// Failure of a single backing tier. Never surfaced by the store facade.
#[derive(Error, Debug)]
pub enum TierError {
    /// The tier cannot be reached right now.
    #[error("Tier unavailable: {0}")]
    Unavailable(String),

    /// `SQLite` failure inside the relational tier.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Encoding or decoding a stored value failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result alias for tier operations.
pub type TierResult<T> = std::result::Result<T, TierError>;

/// Logical key of a stored value, independent of any one tier's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// An agent's personality profile.
    Profile(AgentId),
    /// An agent's episodic memory list.
    Memories(AgentId),
    /// The relationship from an agent toward a counterpart.
    Relationship(AgentId, Address),
}

impl StoreKey {
    /// The agent this key belongs to.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        match *self {
            Self::Profile(a) | Self::Memories(a) | Self::Relationship(a, _) => a,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(agent) => write!(f, "profile:{agent}"),
            Self::Memories(agent) => write!(f, "memories:{agent}"),
            Self::Relationship(agent, other) => write!(f, "relationship:{agent}:{other}"),
        }
    }
}

/// A durable backing store in the tier chain.
#[async_trait]
pub trait Tier: Send + Sync {
    /// Short name used in logs and acks.
    fn name(&self) -> &str;

    /// Check that the tier is reachable.
    async fn probe(&self) -> TierResult<()>;

    /// Read a record.
    async fn get(&self, key: &str) -> TierResult<Option<Vec<u8>>>;

    /// Write (upsert) a record.
    async fn put(&self, key: &str, value: &[u8]) -> TierResult<()>;

    /// Prepend an entry to a newest-first list, trimming if the tier bounds it.
    async fn push(&self, key: &str, value: &[u8]) -> TierResult<()>;

    /// Up to `count` list entries, newest first.
    async fn range(&self, key: &str, count: usize) -> TierResult<Vec<Vec<u8>>>;
}

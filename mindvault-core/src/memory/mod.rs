//! Episodic memory records and the bounded per-agent log.
//!
//! Callers describe an event with a [`MemoryDraft`]; the store validates it,
//! assigns the next id and timestamp, and turns it into an immutable
//! [`MemoryRecord`]. The in-process view of each agent's records is a
//! [`MemoryLog`] capped at [`LOG_CAPACITY`].

pub mod log;

pub use log::{LOG_CAPACITY, MemoryLog};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MindError, Result};
use crate::types::{Address, MemoryKind, Polarity};

/// Highest permitted significance.
pub const SIGNIFICANCE_MAX: u8 = 100;

/// A stored episodic memory. Append-only: never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Monotonic id within the owning agent's log.
    pub id: u64,
    /// The other party, if any. `None` for environmental or self events.
    pub counterpart: Option<Address>,
    /// Event category.
    pub kind: MemoryKind,
    /// Opaque payload.
    pub content: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Importance in `[0, 100]`.
    pub significance: u8,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Good or bad for the agent.
    pub polarity: Polarity,
}

impl MemoryRecord {
    /// The counterpart whose relationship this memory moves, if any.
    #[must_use]
    pub fn relationship_target(&self) -> Option<Address> {
        self.counterpart.filter(|a| !a.is_null())
    }

    /// Affinity change this memory applies to its counterpart.
    #[must_use]
    pub fn affinity_delta(&self) -> i64 {
        self.polarity.signed(self.significance)
    }
}

/// An event as reported by a caller, before id and timestamp assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDraft {
    /// The other party, if any.
    pub counterpart: Option<Address>,
    /// Event category.
    pub kind: MemoryKind,
    /// Opaque payload; must not be empty.
    pub content: String,
    /// Importance; must lie in `[0, 100]`.
    pub significance: i64,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Good or bad for the agent.
    pub polarity: Polarity,
}

impl MemoryDraft {
    /// A positive, zero-significance draft with no counterpart or tags.
    #[must_use]
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            counterpart: None,
            kind,
            content: content.into(),
            significance: 0,
            tags: BTreeSet::new(),
            polarity: Polarity::Positive,
        }
    }

    /// Set the counterpart. The null address is stored as no counterpart.
    #[must_use]
    pub fn with_counterpart(mut self, counterpart: Address) -> Self {
        self.counterpart = (!counterpart.is_null()).then_some(counterpart);
        self
    }

    /// Set the significance (validated on [`MemoryDraft::validate`]).
    #[must_use]
    pub fn with_significance(mut self, significance: i64) -> Self {
        self.significance = significance;
        self
    }

    /// Set the polarity.
    #[must_use]
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Add one tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Check the draft without consuming it.
    ///
    /// # Errors
    /// [`MindError::MissingField`] for empty content,
    /// [`MindError::InvalidRange`] for significance outside `[0, 100]`.
    pub fn validate(&self) -> Result<u8> {
        if self.content.trim().is_empty() {
            return Err(MindError::MissingField("content"));
        }
        u8::try_from(self.significance)
            .ok()
            .filter(|s| *s <= SIGNIFICANCE_MAX)
            .ok_or_else(|| MindError::InvalidRange {
                field: "significance".to_string(),
                value: self.significance,
                min: 0,
                max: i64::from(SIGNIFICANCE_MAX),
            })
    }

    /// Validate and stamp the draft into a record.
    ///
    /// # Errors
    /// Same as [`MemoryDraft::validate`].
    pub fn into_record(self, id: u64, timestamp: DateTime<Utc>) -> Result<MemoryRecord> {
        let significance = self.validate()?;
        Ok(MemoryRecord {
            id,
            counterpart: self.counterpart.filter(|a| !a.is_null()),
            kind: self.kind,
            content: self.content,
            timestamp,
            significance,
            tags: self.tags,
            polarity: self.polarity,
        })
    }
}

//! Pairwise relationships and the affinity ladder.
//!
//! Affinity is the only stored score. The categorical label is computed
//! from it on demand and is never persisted, so the two cannot drift.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, AgentId};

/// Lowest possible affinity.
pub const AFFINITY_MIN: i64 = -100;
/// Highest possible affinity.
pub const AFFINITY_MAX: i64 = 100;

/// Category derived from affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLabel {
    /// Affinity ≥ 70.
    Friend,
    /// Affinity ≥ 30.
    Ally,
    /// Anything between rival and ally.
    Neutral,
    /// Affinity ≤ −30.
    Rival,
    /// Affinity ≤ −70.
    Enemy,
}

impl RelationshipLabel {
    /// Classify an affinity value. Evaluated top-down, first match wins.
    #[must_use]
    pub fn from_affinity(affinity: i64) -> Self {
        match affinity {
            a if a >= 70 => Self::Friend,
            a if a >= 30 => Self::Ally,
            a if a <= -70 => Self::Enemy,
            a if a <= -30 => Self::Rival,
            _ => Self::Neutral,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friend => "friend",
            Self::Ally => "ally",
            Self::Neutral => "neutral",
            Self::Rival => "rival",
            Self::Enemy => "enemy",
        }
    }
}

impl fmt::Display for RelationshipLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one agent stands toward one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The agent holding the opinion.
    pub agent: AgentId,
    /// Who the opinion is about.
    pub counterpart: Address,
    affinity: i64,
    interaction_count: u64,
    last_interaction: DateTime<Utc>,
}

impl Relationship {
    /// A fresh, neutral relationship with no interactions yet.
    #[must_use]
    pub fn new(agent: AgentId, counterpart: Address) -> Self {
        Self {
            agent,
            counterpart,
            affinity: 0,
            interaction_count: 0,
            last_interaction: Utc::now(),
        }
    }

    /// Current affinity in `[-100, 100]`.
    #[must_use]
    pub fn affinity(&self) -> i64 {
        self.affinity
    }

    /// Number of recorded interactions.
    #[must_use]
    pub fn interaction_count(&self) -> u64 {
        self.interaction_count
    }

    /// When the last interaction was recorded.
    #[must_use]
    pub fn last_interaction(&self) -> DateTime<Utc> {
        self.last_interaction
    }

    /// Category for the current affinity.
    #[must_use]
    pub fn label(&self) -> RelationshipLabel {
        RelationshipLabel::from_affinity(self.affinity)
    }

    /// Apply one interaction: add `delta`, clamp, count it, stamp it.
    pub fn record(&mut self, delta: i64, at: DateTime<Utc>) {
        self.affinity = self
            .affinity
            .saturating_add(delta)
            .clamp(AFFINITY_MIN, AFFINITY_MAX);
        self.interaction_count = self.interaction_count.saturating_add(1);
        self.last_interaction = at;
    }

    /// Re-establish the affinity bound on a value decoded from storage.
    #[must_use]
    pub(crate) fn sanitized(mut self) -> Self {
        self.affinity = self.affinity.clamp(AFFINITY_MIN, AFFINITY_MAX);
        self
    }
}

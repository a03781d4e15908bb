//! Personality profiles and archetype presets.
//!
//! A profile is created once per agent and never changes shape afterwards:
//! the trait set is fixed by [`TraitKind`], only values move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MindError, Result};
use crate::types::{AgentId, TraitKind, TraitVector};

/// One agent's personality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    /// Owner of the profile.
    pub agent: AgentId,
    /// Trait values, each in `[0, 100]`.
    pub traits: TraitVector,
    /// Free-text biography.
    pub backstory: String,
    /// Short behavioural quirks, in author order.
    pub quirks: Vec<String>,
    /// When a value last changed.
    pub last_updated: DateTime<Utc>,
    /// Set once initialization has succeeded.
    pub initialized: bool,
}

impl PersonalityProfile {
    /// Validate inputs and build an initialized profile.
    ///
    /// # Errors
    /// [`MindError::MissingField`] for a blank backstory or quirk.
    pub fn new(
        agent: AgentId,
        traits: TraitVector,
        backstory: impl Into<String>,
        quirks: Vec<String>,
    ) -> Result<Self> {
        let backstory = backstory.into();
        if backstory.trim().is_empty() {
            return Err(MindError::MissingField("backstory"));
        }
        if quirks.iter().any(|q| q.trim().is_empty()) {
            return Err(MindError::MissingField("quirks[]"));
        }
        Ok(Self {
            agent,
            traits,
            backstory,
            quirks,
            last_updated: Utc::now(),
            initialized: true,
        })
    }

    /// Set one trait and bump `last_updated`.
    ///
    /// # Errors
    /// [`MindError::InvalidRange`] if `value` lies outside `[0, 100]`; the
    /// profile is left untouched.
    pub fn update_trait(&mut self, kind: TraitKind, value: i64) -> Result<()> {
        self.traits.set(kind, value)?;
        self.last_updated = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Archetypes
// ---------------------------------------------------------------------------

/// Archetype used when a requested name is unknown.
pub const DEFAULT_ARCHETYPE: &str = "scholar";

/// Canonical trait values per archetype, in [`TraitKind::ALL`] order:
/// aggression, curiosity, loyalty, humor, greed, caution, empathy, ambition.
const ARCHETYPES: &[(&str, TraitVector)] = &[
    ("warrior", TraitVector::saturating([80, 40, 70, 40, 30, 30, 40, 70])),
    ("merchant", TraitVector::saturating([20, 60, 50, 60, 85, 60, 50, 75])),
    ("scholar", TraitVector::saturating([15, 90, 60, 40, 20, 70, 60, 50])),
    ("trickster", TraitVector::saturating([40, 75, 25, 90, 60, 20, 35, 60])),
    ("guardian", TraitVector::saturating([50, 35, 90, 30, 15, 80, 75, 35])),
];

/// Names of the known archetypes.
pub fn archetype_names() -> impl Iterator<Item = &'static str> {
    ARCHETYPES.iter().map(|(name, _)| *name)
}

/// Trait values for a named archetype (case-insensitive).
///
/// Unknown names resolve to the scholar preset rather than failing.
#[must_use]
pub fn archetype_traits(name: &str) -> TraitVector {
    let wanted = name.trim().to_ascii_lowercase();
    ARCHETYPES
        .iter()
        .find(|(n, _)| *n == wanted)
        .or_else(|| ARCHETYPES.iter().find(|(n, _)| *n == DEFAULT_ARCHETYPE))
        .map_or(TraitVector::saturating([50; TraitKind::COUNT]), |(_, v)| *v)
}

//! Core type definitions for the mindvault state store.
//!
//! Identifiers, the closed trait enumeration, and the small enums shared by
//! every subsystem. All types are serializable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MindError, Result};

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Opaque identifier of an agent, assigned by an external registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 20-byte actor address identifying the counterpart of an interaction.
///
/// Rendered and parsed as a `0x`-prefixed hex string. [`Address::NULL`]
/// marks anonymous or environmental events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero sentinel address.
    pub const NULL: Self = Self([0; 20]);

    /// Whether this is the null sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Build an address whose last eight bytes hold `n` (test and tooling helper).
    #[must_use]
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = MindError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| MindError::Config(format!("invalid address {s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Personality Traits
// ---------------------------------------------------------------------------

/// The closed set of personality traits every profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Readiness to resort to force.
    Aggression,
    /// Appetite for the new and unexplained.
    Curiosity,
    /// Steadfastness toward allies and causes.
    Loyalty,
    /// Playfulness in speech and action.
    Humor,
    /// Desire for wealth and possessions.
    Greed,
    /// Aversion to risk.
    Caution,
    /// Sensitivity to the feelings of others.
    Empathy,
    /// Drive for status and achievement.
    Ambition,
}

impl TraitKind {
    /// Number of trait kinds.
    pub const COUNT: usize = 8;

    /// All trait kinds in canonical order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Aggression,
        Self::Curiosity,
        Self::Loyalty,
        Self::Humor,
        Self::Greed,
        Self::Caution,
        Self::Empathy,
        Self::Ambition,
    ];

    /// Position of this trait in a [`TraitVector`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aggression => "aggression",
            Self::Curiosity => "curiosity",
            Self::Loyalty => "loyalty",
            Self::Humor => "humor",
            Self::Greed => "greed",
            Self::Caution => "caution",
            Self::Empathy => "empathy",
            Self::Ambition => "ambition",
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bound of every trait value.
pub const TRAIT_MAX: u8 = 100;

/// One value in `[0, 100]` per [`TraitKind`].
///
/// The shape is fixed; only values change. Every constructor and setter
/// validates the range, so a `TraitVector` in hand is always in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u8; 8]")]
pub struct TraitVector([u8; TraitKind::COUNT]);

impl TryFrom<[u8; TraitKind::COUNT]> for TraitVector {
    type Error = MindError;

    fn try_from(raw: [u8; TraitKind::COUNT]) -> Result<Self> {
        let values: Vec<i64> = raw.iter().map(|&v| i64::from(v)).collect();
        Self::from_values(&values)
    }
}

impl TraitVector {
    /// Build a vector from values in [`TraitKind::ALL`] order.
    ///
    /// # Errors
    /// [`MindError::InvalidRange`] if the list length is wrong or any value
    /// lies outside `[0, 100]`.
    pub fn from_values(values: &[i64]) -> Result<Self> {
        if values.len() != TraitKind::COUNT {
            return Err(MindError::InvalidRange {
                field: "traits.len".to_string(),
                value: values.len() as i64,
                min: TraitKind::COUNT as i64,
                max: TraitKind::COUNT as i64,
            });
        }
        let mut out = [0u8; TraitKind::COUNT];
        for (kind, (slot, &value)) in TraitKind::ALL.iter().zip(out.iter_mut().zip(values)) {
            *slot = checked_trait_value(*kind, value)?;
        }
        Ok(Self(out))
    }

    /// Build a vector from raw values, saturating anything above 100.
    #[must_use]
    pub const fn saturating(mut values: [u8; TraitKind::COUNT]) -> Self {
        let mut i = 0;
        while i < TraitKind::COUNT {
            if values[i] > TRAIT_MAX {
                values[i] = TRAIT_MAX;
            }
            i += 1;
        }
        Self(values)
    }

    /// Value of a single trait.
    #[must_use]
    pub fn get(&self, kind: TraitKind) -> u8 {
        self.0[kind.index()]
    }

    /// Set a single trait.
    ///
    /// # Errors
    /// [`MindError::InvalidRange`] if `value` lies outside `[0, 100]`.
    pub fn set(&mut self, kind: TraitKind, value: i64) -> Result<()> {
        self.0[kind.index()] = checked_trait_value(kind, value)?;
        Ok(())
    }

    /// Iterate `(kind, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (TraitKind, u8)> + '_ {
        TraitKind::ALL.iter().map(|&k| (k, self.get(k)))
    }

    /// Raw values in canonical order.
    #[must_use]
    pub fn values(&self) -> [u8; TraitKind::COUNT] {
        self.0
    }
}

// In range, so the cast is lossless.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn checked_trait_value(kind: TraitKind, value: i64) -> Result<u8> {
    if (0..=i64::from(TRAIT_MAX)).contains(&value) {
        Ok(value as u8)
    } else {
        Err(MindError::InvalidRange {
            field: format!("traits.{kind}"),
            value,
            min: 0,
            max: i64::from(TRAIT_MAX),
        })
    }
}

// ---------------------------------------------------------------------------
// Memory classification
// ---------------------------------------------------------------------------

/// What kind of event a memory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A direct exchange with a counterpart.
    Interaction,
    /// Something the agent accomplished.
    Achievement,
    /// A change in how the agent stands with someone.
    Relationship,
    /// Something that happened in the world.
    Event,
    /// Words spoken or heard.
    Dialogue,
}

impl MemoryKind {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::Achievement => "achievement",
            Self::Relationship => "relationship",
            Self::Event => "event",
            Self::Dialogue => "dialogue",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an event was good or bad for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// A pleasant or favourable event.
    Positive,
    /// An unpleasant or hostile event.
    Negative,
}

impl Polarity {
    /// Apply this polarity's sign to a magnitude.
    #[must_use]
    pub fn signed(self, magnitude: u8) -> i64 {
        match self {
            Self::Positive => i64::from(magnitude),
            Self::Negative => -i64::from(magnitude),
        }
    }

    /// Single-character marker used in briefings.
    #[must_use]
    pub fn marker(self) -> char {
        match self {
            Self::Positive => '+',
            Self::Negative => '-',
        }
    }
}

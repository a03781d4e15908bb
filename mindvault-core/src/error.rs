//! Error types for the mindvault core library.
//!
//! Only [`MindError`] ever reaches callers of [`crate::MindStore`]. Tier and
//! ledger faults have their own types ([`crate::tier::TierError`],
//! [`crate::ledger::LedgerError`]) and are absorbed by the store: logged,
//! then degraded to a best-effort guarantee.

use thiserror::Error;

use crate::types::AgentId;

/// Top-level error type for user-visible mindvault failures.
#[derive(Error, Debug)]
pub enum MindError {
    /// A numeric input lies outside its permitted range.
    #[error("Invalid range for {field}: {value} (allowed: {min}..={max})")]
    InvalidRange {
        /// Which input was rejected.
        field: String,
        /// The offending value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// A required field was empty or missing.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A personality profile already exists for this agent.
    #[error("Personality already initialized for agent {0}")]
    AlreadyInitialized(AgentId),

    /// The operation requires a profile and none exists.
    #[error("No personality profile for agent {0}")]
    ProfileNotFound(AgentId),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MindError {
    /// Whether this is an input-validation failure (no state was changed).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRange { .. } | Self::MissingField(_))
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MindError>;

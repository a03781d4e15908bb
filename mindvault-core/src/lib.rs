//! # mindvault core
//!
//! Persistent mind state for autonomous game agents.
//!
//! Every agent owns three kinds of state:
//!
//! - **Personality**: a fixed set of trait values, backstory and quirks,
//!   created once ([`personality`]).
//! - **Episodic memory**: a bounded, time-ordered log of events
//!   ([`memory`]).
//! - **Relationships**: a clamped affinity score per counterpart with a
//!   derived label ([`relationship`]).
//!
//! [`MindStore`] keeps the live copy in process and writes through a chain of
//! optional durable tiers ([`tier`]). High-significance memories are also
//! promoted to an append-only [`ledger::AuthoritativeLedger`]
//! ([`promotion`]). [`briefing`] renders the current state as text for an
//! external decision engine.
//!
//! ## Failure model
//!
//! Only input validation and a repeated initialization fail a call. Tier
//! outages and ledger errors are logged and absorbed.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod briefing;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod personality;
pub mod promotion;
pub mod relationship;
pub mod store;
pub mod telemetry;
pub mod tier;
pub mod types;

pub use config::MindConfig;
pub use error::{MindError, Result};
pub use memory::{MemoryDraft, MemoryRecord};
pub use personality::PersonalityProfile;
pub use relationship::{Relationship, RelationshipLabel};
pub use store::MindStore;
pub use types::*;

//! # mindvault-ledger
//!
//! The authoritative tier for mindvault: an append-only, externally
//! verifiable record of promoted memories and personality snapshots.
//!
//! [`HashChainLedger`] stores entries in `SQLite` and links each one to its
//! predecessor with a SHA-256 hash, so any later edit to a stored payload is
//! caught by [`HashChainLedger::verify_chain`]. It implements
//! [`mindvault_core::ledger::AuthoritativeLedger`] and plugs straight into a
//! `MindStore`:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mindvault_core::{AgentId, MindConfig, MindStore};
//! # use mindvault_ledger::HashChainLedger;
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MindConfig::from_file("mindvault.toml".as_ref())?;
//! let ledger = Arc::new(HashChainLedger::open("ledger.db")?);
//! ledger.grant_controller(AgentId(7), config.promotion.controller)?;
//! let store = MindStore::open(config, Some(ledger)).await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod hash;

pub use chain::{ChainStatus, HashChainLedger};
pub use hash::{GENESIS_HASH, link_hash};

//! Configuration for the mindvault store.
//!
//! Maps directly to `mindvault.toml`. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindConfig {
    /// Logging and general settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Storage tier selection and behaviour.
    #[serde(default)]
    pub tiers: TierConfig,
    /// Authoritative-ledger promotion settings.
    #[serde(default)]
    pub promotion: PromotionConfig,
}

impl MindConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MindError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::MindError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// A configuration with no durable tiers and inline writes.
    ///
    /// Handy for tests and tools that only need the in-process arena.
    #[must_use]
    pub fn in_process_only() -> Self {
        Self {
            tiers: TierConfig {
                cache_enabled: false,
                sqlite_enabled: false,
                write_behind: false,
                ..TierConfig::default()
            },
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Which durable tiers to open and how writes reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Open the shared cache tier.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Maximum keys held by the cache tier before LRU eviction.
    #[serde(default = "default_cache_keys")]
    pub cache_max_keys: usize,
    /// Length of the newest-first list view the cache keeps per key.
    #[serde(default = "default_100")]
    pub cache_list_capacity: usize,
    /// Open the relational (`SQLite`) tier.
    #[serde(default = "default_true")]
    pub sqlite_enabled: bool,
    /// Database file for the relational tier.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Minimum delay before an unavailable tier is probed again.
    #[serde(default = "default_reprobe_ms")]
    pub reprobe_interval_ms: u64,
    /// Run durable fan-out on a background task instead of awaiting it.
    #[serde(default = "default_true")]
    pub write_behind: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_max_keys: 10_000,
            cache_list_capacity: 100,
            sqlite_enabled: true,
            sqlite_path: default_sqlite_path(),
            wal_mode: true,
            checksum_enabled: true,
            reprobe_interval_ms: 5_000,
            write_behind: true,
        }
    }
}

/// Promotion to the authoritative ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Submit promotions at all. Off means the ledger is never written.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Outbound queue depth; promotions beyond it are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Also commit a personality snapshot when a profile is initialized.
    #[serde(default = "default_true")]
    pub promote_profiles: bool,
    /// Controller address presented to the ledger on every commit.
    #[serde(default)]
    pub controller: Address,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 1_024,
            promote_profiles: true,
            controller: Address::NULL,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_sqlite_path() -> PathBuf { PathBuf::from("mindvault.db") }
fn default_cache_keys() -> usize { 10_000 }
fn default_100() -> usize { 100 }
fn default_reprobe_ms() -> u64 { 5_000 }
fn default_queue_capacity() -> usize { 1_024 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = MindConfig::from_toml("").expect("parse");
        assert!(cfg.tiers.cache_enabled);
        assert!(cfg.tiers.write_behind);
        assert_eq!(cfg.tiers.cache_list_capacity, 100);
        assert_eq!(cfg.promotion.queue_capacity, 1_024);
        assert!(cfg.promotion.controller.is_null());
    }

    #[test]
    fn partial_toml_overrides() {
        let cfg = MindConfig::from_toml(
            r#"
            [general]
            log_level = "debug"

            [tiers]
            sqlite_enabled = false
            reprobe_interval_ms = 0

            [promotion]
            controller = "0x00000000000000000000000000000000000000aa"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.general.log_level, "debug");
        assert!(!cfg.tiers.sqlite_enabled);
        assert!(cfg.tiers.cache_enabled);
        assert_eq!(cfg.tiers.reprobe_interval_ms, 0);
        assert_eq!(cfg.promotion.controller, Address::from_low_u64(0xaa));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = MindConfig::from_toml("[tiers]\nwrite_behind = \"yes\"").expect_err("bad type");
        assert!(matches!(err, crate::MindError::Config(_)));
    }
}

//! Tracing bootstrap.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! embedding binary's choice. [`init_tracing`] is the stock one.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::GeneralConfig;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` overrides `config.log_level`. Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_tracing(config: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(level = %config.log_level, json = config.json_logs, "Tracing initialised");
            true
        }
        Err(_) => false,
    }
}

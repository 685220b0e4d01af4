//! Tracing subscriber setup
//!
//! The library only emits `tracing` events; hosts that have no subscriber
//! of their own can install a formatted one here. `RUST_LOG` overrides the
//! default `info` level.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global fmt subscriber, failing if one is already set
pub fn try_init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install tracing subscriber: {e}")))
}

/// Install a global fmt subscriber; does nothing if one is already set
pub fn init() {
    if try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

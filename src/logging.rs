//! # Structured Logging Setup
//!
//! Convenience initializer for integrators that do not already install a
//! `tracing` subscriber. The core itself only emits events; subscribing is
//! the host application's decision, which is why this is opt-in.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a console `tracing` subscriber filtered by `CHAIN_DISPATCH_LOG`
/// (falling back to `info`). Safe to call more than once; later calls are
/// no-ops, as is calling it when the host already installed a subscriber.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_env("CHAIN_DISPATCH_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("global tracing subscriber already installed, keeping it");
        }
    });
}

//! # Telemetry
//!
//! Installs the process-wide `tracing` subscriber.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `directive`
#[must_use]
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install a JSON `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `directive` (e.g. `"info"` or
/// `"trellis_core=debug"`). Returns `false` when a global subscriber was
/// already installed, so calling this more than once is harmless.
pub fn init_tracing(directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive))
        .with_target(true)
        .json()
        .try_init()
        .is_ok()
}

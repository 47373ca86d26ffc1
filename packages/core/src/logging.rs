//! Tracing subscriber bootstrap
//!
//! Services only emit `tracing` events; binaries and tests embedding the
//! crate call [`init_tracing`] once to print them.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_directive` (e.g. `"info"` or
/// `"tracker_core=debug"`) when `RUST_LOG` is unset or invalid. Returns
/// `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

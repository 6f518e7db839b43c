//! Process-wide logging setup.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber: JSON lines to stdout, level
/// selection via `RUST_LOG` (default `info`).
///
/// Idempotent: if a subscriber is already installed (tests initialise
/// eagerly) the call is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .json()
        .try_init();
}

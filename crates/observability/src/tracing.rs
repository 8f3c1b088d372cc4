//! Tracing/logging initialization.
//!
//! The ledger crates emit spans and events through `tracing`; a host process
//! (API server, desktop shell, test harness) calls [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Initialize JSON logging for the process.
///
/// Filtering comes from `RUST_LOG` (default `info`). Safe to call multiple
/// times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

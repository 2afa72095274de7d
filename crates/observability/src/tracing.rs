//! Tracing/logging initialization.
//!
//! JSON structured logs filtered via `RUST_LOG`. Audit events emitted by the
//! engine use the `audit` target, so an operator can raise or lower their
//! verbosity independently (e.g. `RUST_LOG=info,audit=debug`).

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}

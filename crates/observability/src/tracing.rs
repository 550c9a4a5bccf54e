//! Tracing/logging initialization.
//!
//! The policy engine reports unparseable rule domains and cache invalidations
//! through `tracing`; hosts that want those diagnostics in their logs call
//! [`init`] once at startup (or install their own subscriber).

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    // Surface the engine's misconfiguration warnings by default; everything
    // else stays at info unless RUST_LOG overrides.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ledgersuite_policy=debug"));

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

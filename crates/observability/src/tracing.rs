//! Subscriber setup for the marketplace binaries.
//!
//! `RUST_LOG` controls filtering; without it everything logs at `info`.

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the human-readable subscriber. Calling it again is a no-op, so
/// tests and the CLI can both call it unconditionally.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init();
}

/// Install the JSON subscriber (one object per line, for log shippers).
/// Like [`init`], repeated calls are no-ops.
pub fn init_json() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

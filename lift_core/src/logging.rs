//! Logging infrastructure for Lift.
//!
//! Log output goes to stderr so it never mixes with command output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at WARN, overridable with RUST_LOG
pub fn init() {
    init_with_level("warn")
}

/// Install the stderr subscriber. `fallback` is any EnvFilter directive
/// (`"info"`, `"lift_core=debug"`) and only applies when RUST_LOG is unset
/// or unparseable. A second call is ignored.
pub fn init_with_level(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Debug-level subscriber routed through the test harness, so output only
/// shows for failing tests
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}

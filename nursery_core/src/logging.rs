//! Tracing setup shared by the nursery binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter: quiet enough that command output stays readable
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the stderr subscriber at the default level
pub fn init() {
    init_with_level(DEFAULT_LEVEL)
}

/// Install the stderr subscriber, falling back to `level` when RUST_LOG is unset
///
/// Background refresh threads log through the same subscriber, so this must
/// run before any timer is started.
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init();
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Route logs into the test harness output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("nursery_core=debug"))
        .try_init();
}

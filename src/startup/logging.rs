//! Tracing subscriber setup for the binary.
//!
//! The library only emits events; installing a subscriber is left to
//! whoever embeds it.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "CHRONICLE_LOG";

/// Filter used when `CHRONICLE_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "chronicle=info";

/// Install the global subscriber, writing to stderr.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

//! Tracing setup for the `yasi` binary.
//!
//! All diagnostics go to stderr through `tracing`. Result lines printed by
//! the CLI (`idle: ...`, `batch: ...`) go to stdout and are not affected by
//! `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "yasi=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `yasi=info` if unset or invalid.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=yasi=debug yasi idle -a 220 -c r2
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

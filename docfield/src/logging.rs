//! Tracing setup for binaries and examples.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

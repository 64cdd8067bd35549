//! Subscriber setup for binaries. The library itself only emits events.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over the configured
/// filter. Does nothing if a subscriber is already installed.
pub fn init(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

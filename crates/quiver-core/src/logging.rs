//! Logging initialization for Quiver runtimes.
//!
//! A thin bootstrap around `tracing-subscriber`: respects `RUST_LOG` when set,
//! otherwise uses the level passed in. Embedders with their own subscriber
//! simply never call this.

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber.
///
/// `default_level` is any `EnvFilter` directive (e.g. `"info"` or
/// `"quiver_extension=debug"`); the `RUST_LOG` environment variable, when
/// present, takes precedence. Calling this twice is harmless: the second call
/// is a no-op.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

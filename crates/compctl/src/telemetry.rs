//! Log subscriber setup. Logs go to stderr so stdout stays machine readable.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `log_level` from config, falling back to info.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

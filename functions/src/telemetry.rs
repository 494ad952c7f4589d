//! Process-wide structured logging.
use tracing_subscriber::EnvFilter;

/// Installs a JSON subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Calling it again once a subscriber is installed does nothing.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

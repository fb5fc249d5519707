//! Tracing initialization and subscriber setup.

use crate::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global tracing subscriber writing to stderr.
///
/// # Filter Resolution
///
/// 1. `RUST_LOG`, when set and valid
/// 2. `config.trace_level`
/// 3. `"info"`
///
/// Idempotent: only the first call in a process installs anything, later calls
/// are silently ignored. Hosts that already run their own subscriber can skip
/// this entirely; the crate only emits `tracing` events.
///
/// # Example
///
/// ```rust
/// use statewire::observability::init_tracing;
/// use statewire::Config;
///
/// let config = Config {
///     trace_level: Some("debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let level = config
        .trace_level
        .clone()
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        );

    let _ = subscriber.try_init();
}

//! Tracing subscriber setup for hosts that embed the session.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that takes precedence over `RUST_LOG` and the configured level.
pub const LOG_ENV: &str = "RENDER_SESSION_LOG";

/// Filter used for the subscriber: `RENDER_SESSION_LOG`, then `RUST_LOG`,
/// then `config.level`. An unparsable configured level falls back to `info`.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global subscriber writing to stderr.
///
/// Stdout is left to the host. If a subscriber is already installed this does
/// nothing, so hosts that set up their own tracing keep it.
pub fn init_logging(config: &LoggingConfig) {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(build_filter(config))
        .with_writer(std::io::stderr);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.with_target(true).finish()).is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    }
}

/// Initialize logging with default settings.
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

//! Structured logging setup for forge
//!
//! Initialization and configuration for structured logging on top of the
//! `tracing` ecosystem. Supports pretty console output for interactive use
//! and JSON output for CI environments, with filtering via `RUST_LOG` or
//! `FORGE_LOG_LEVEL`.
//!
//! Logging can only be initialized once per process; repeated calls are
//! no-ops.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display
    pub level: Level,

    /// Use JSON output format (for structured logging in CI)
    pub use_json: bool,

    /// Include the module target (e.g., forge::discovery) in logs
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Initializes logging with the given configuration.
///
/// Safe to call multiple times; only the first call takes effect. Respects
/// `RUST_LOG` when set, otherwise scopes the level to the forge crate.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter = filter.add_directive(
                format!("forge={}", config.level)
                    .parse()
                    .expect("valid level directive"),
            );
        }

        let registry = tracing_subscriber::registry().with(filter);
        if config.use_json {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(config.include_target)
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(config.include_target)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    });
}

/// Initializes logging with defaults (INFO, pretty console output).
pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from the `FORGE_LOG_LEVEL` environment variable.
pub fn init_from_env() {
    let level = env::var("FORGE_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(Level::INFO);
    init_logging(LoggingConfig::with_level(level));
}

/// Parses a level name, returning `None` for unrecognized input.
pub fn parse_level(level_str: &str) -> Option<Level> {
    match level_str.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

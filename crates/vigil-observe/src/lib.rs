//! Logging bootstrap for the vigil daemon and tools.

mod config;
pub use config::LoggerConfig;

mod error;
pub use error::{LoggerError, LoggerResult};

mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod log;
mod rfc3339;

/// Initializes the global tracing subscriber with the given configuration.
///
/// Once installed, all `tracing` macros (`info!`, `debug!`, ...) flow
/// through it. Timestamps are RFC3339 in UTC. Calling this twice returns
/// [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use vigil_observe::{LoggerConfig, init_logger};
///
/// let config = LoggerConfig::default();
/// init_logger(&config).expect("Failed to initialize logger");
///
/// tracing::info!("logger initialized");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::logger_text(cfg),
        LoggerFormat::Json => log::logger_json(cfg),
        LoggerFormat::Journald => log::logger_journald(cfg),
    }
}

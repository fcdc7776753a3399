use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::format::LoggerFormat;
use crate::level::LoggerLevel;

/// Logger configuration.
///
/// Timestamps are always rendered in UTC; the daemon runs in containers
/// and fleet logs are only comparable on a single clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Log level filter expression (e.g., "info", "vigil_engine=debug,info").
    pub level: LoggerLevel,
    /// Whether to include module/target names in log output.
    pub with_targets: bool,
    /// Whether to use colored output.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Whether colored output should actually be used.
    ///
    /// Requires both `use_color` and stdout being a terminal, so logs
    /// piped to a file never carry escape codes. Evaluated at logger
    /// initialization, not at config parse time.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

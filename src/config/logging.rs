//! Logging configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Raise the level by the number of `-v` flags; `-q` wins over both
    pub fn adjusted(self, verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Error;
        }
        match verbose {
            0 => self,
            1 => self.max(Self::Debug),
            _ => Self::Trace,
        }
    }

    /// Filter directive: our own crate at this level, dependencies at warn
    pub fn directive(&self) -> String {
        match self {
            Self::Error | Self::Warn => self.as_str().to_string(),
            _ => format!("warn,geo_db={}", self.as_str()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(LogLevel::Info.adjusted(0, false), LogLevel::Info);
        assert_eq!(LogLevel::Info.adjusted(1, false), LogLevel::Debug);
        assert_eq!(LogLevel::Trace.adjusted(1, false), LogLevel::Trace);
        assert_eq!(LogLevel::Info.adjusted(3, false), LogLevel::Trace);
        assert_eq!(LogLevel::Debug.adjusted(2, true), LogLevel::Error);
    }

    #[test]
    fn directive_scopes_verbose_levels_to_crate() {
        assert_eq!(LogLevel::Debug.directive(), "warn,geo_db=debug");
        assert_eq!(LogLevel::Warn.directive(), "warn");
    }
}

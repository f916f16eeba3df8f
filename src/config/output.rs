//! Destination and run configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite destination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Database file; must not exist yet
    pub path: PathBuf,
    /// Rows per transaction
    pub commit_every: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("geo.db"),
            commit_every: 10_000,
        }
    }
}

/// Import run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Instant that temporal qualifiers are checked against.
    /// Defaults to the wall-clock time when the run starts.
    pub reference_time: Option<DateTime<Utc>>,
    /// Seconds between progress reports
    pub progress_interval_secs: u64,
    /// Draw a progress bar instead of logging progress lines
    pub progress_bar: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            reference_time: None,
            progress_interval_secs: 10,
            progress_bar: false,
        }
    }
}

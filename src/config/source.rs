//! Dump source and decompressor configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::DEFAULT_USER_AGENT;

/// Default location of the full entity dump
pub const DEFAULT_DUMP_URL: &str =
    "https://dumps.wikimedia.org/wikidatawiki/entities/latest-all.json.bz2";

/// Where the compressed dump comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Dump URL, streamed with a single GET
    pub url: String,
    /// Local dump file; takes precedence over `url` when set
    pub path: Option<PathBuf>,
    /// User agent for every HTTP request
    pub user_agent: String,
    /// Connect timeout (seconds). The body itself has no timeout.
    pub connect_timeout_secs: u64,
    /// Per-entity JSON endpoint used by `geo-db entity`
    pub entity_data_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DUMP_URL.to_string(),
            path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 30,
            entity_data_url: "https://www.wikidata.org/wiki/Special:EntityData".to_string(),
        }
    }
}

/// External decompression process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressorConfig {
    /// Program reading compressed bytes on stdin and writing plain bytes to stdout
    pub command: String,
    pub args: Vec<String>,
    /// Maximum unread decompressed bytes before writes block
    pub watermark_bytes: usize,
    /// Size of each read from the process output
    pub read_chunk_bytes: usize,
    /// How often a blocked write re-checks the buffer (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for DecompressorConfig {
    fn default() -> Self {
        Self {
            command: "bzip2".to_string(),
            args: vec!["-dc".to_string()],
            watermark_bytes: 2 * 1024 * 1024,
            read_chunk_bytes: 64 * 1024,
            poll_interval_ms: 10,
        }
    }
}

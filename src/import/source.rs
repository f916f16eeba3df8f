//! Core types and traits for the dump import

use super::bridge::BridgeError;
use crate::classify::Role;
use crate::config::SourceConfig;
use crate::sink::{Relation, SinkError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// A stream of compressed dump bytes.
///
/// Implementations are pulled by a single task; `next_chunk` suspends
/// until bytes are available and returns `None` at end of input.
#[async_trait]
pub trait ByteSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ImportError>;

    /// Total compressed size if known (for progress reporting)
    fn size_hint(&self) -> Option<u64>;

    /// Source name for display
    fn source_name(&self) -> &str;
}

/// Streams the dump body of a single HTTP GET
pub struct HttpSource {
    url: String,
    len: Option<u64>,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

impl HttpSource {
    /// Send the request and wait for the response headers
    pub async fn open(config: &SourceConfig) -> Result<Self, ImportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        debug!("Opening dump stream at {}", config.url);
        let response = client.get(&config.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::HttpStatus {
                url: config.url.clone(),
                status,
            });
        }

        let len = response.content_length();
        info!(
            "Streaming {} ({})",
            config.url,
            len.map(|l| format!("{} MB", l / 1_000_000))
                .unwrap_or_else(|| "unknown size".to_string())
        );

        Ok(Self {
            url: config.url.clone(),
            len,
            stream: response.bytes_stream().boxed(),
        })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ImportError> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<u64> {
        self.len
    }

    fn source_name(&self) -> &str {
        &self.url
    }
}

/// Reads a local compressed dump
pub struct FileSource {
    path: PathBuf,
    name: String,
    file: File,
    len: u64,
    chunk_size: usize,
}

impl FileSource {
    pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        info!("Reading {} ({} MB)", path.display(), len / 1_000_000);

        Ok(Self {
            name: path.display().to_string(),
            path,
            file,
            len,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ImportError> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.len)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// Serves chunks that are already in memory
pub struct MemorySource {
    chunks: VecDeque<Bytes>,
    len: u64,
}

impl MemorySource {
    pub fn new(chunks: impl IntoIterator<Item = impl Into<Bytes>>) -> Self {
        let chunks: VecDeque<Bytes> = chunks.into_iter().map(Into::into).collect();
        let len = chunks.iter().map(|c| c.len() as u64).sum();
        Self { chunks, len }
    }

    /// Split `data` into chunks of `chunk_size` bytes
    pub fn chunked(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        let data: Bytes = data.into();
        let chunk_size = chunk_size.max(1);
        let chunks = (0..data.len())
            .step_by(chunk_size)
            .map(|start| data.slice(start..(start + chunk_size).min(data.len())));
        Self::new(chunks.collect::<Vec<_>>())
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, ImportError> {
        Ok(self.chunks.pop_front())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.len)
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}

/// Import statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    /// Non-empty lines handed to the parser
    pub records_seen: u64,
    /// Records that parsed into an entity
    pub records_parsed: u64,
    /// Records skipped because they were not well-formed
    pub records_malformed: u64,
    /// Entities that matched each role
    pub role_matches: BTreeMap<Role, u64>,
    /// Role handlers that had too little data to emit rows
    pub handler_skips: u64,
    /// Rows accepted by the sink per relation
    pub rows_written: BTreeMap<Relation, u64>,
    /// Compressed bytes read from the source
    pub compressed_bytes: u64,
    /// Bytes produced by the decompressor
    pub decompressed_bytes: u64,
    /// Processing time in seconds
    pub elapsed_seconds: f64,
}

impl ImportStats {
    pub fn role_count(&self, role: Role) -> u64 {
        self.role_matches.get(&role).copied().unwrap_or(0)
    }

    pub fn rows(&self, relation: Relation) -> u64 {
        self.rows_written.get(&relation).copied().unwrap_or(0)
    }

    pub fn total_rows(&self) -> u64 {
        self.rows_written.values().sum()
    }

    pub fn records_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.records_seen as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\nImport Summary");
        println!("==============");
        println!("Records seen:        {}", self.records_seen);
        println!("Records parsed:      {}", self.records_parsed);
        println!("Records malformed:   {}", self.records_malformed);
        for role in Role::ALL {
            println!("{:<21}{}", format!("{} matches:", role), self.role_count(role));
        }
        println!("Handler skips:       {}", self.handler_skips);
        for relation in Relation::ALL {
            println!("{:<21}{}", format!("{}:", relation), self.rows(relation));
        }
        println!("Compressed:          {} MB", self.compressed_bytes / 1_000_000);
        println!("Decompressed:        {} MB", self.decompressed_bytes / 1_000_000);
        println!("Elapsed time:        {:.1}s", self.elapsed_seconds);
        println!("Processing rate:     {:.1} records/s", self.records_per_second());
    }
}

/// Errors that abort an import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("decompression failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("failed to write rows for entity {entity}: {source}")]
    Sink {
        entity: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to finish destination: {0}")]
    Finish(#[source] SinkError),

    #[error("input task failed: {0}")]
    Task(String),
}

impl ImportError {
    /// Whether the source itself failed, as opposed to a later stage
    pub fn is_input_failure(&self) -> bool {
        matches!(
            self,
            ImportError::Io(_) | ImportError::Http(_) | ImportError::HttpStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_memory_source_chunks() {
        let mut source = MemorySource::chunked(&b"abcdefg"[..], 3);
        assert_eq!(source.size_hint(), Some(7));

        let mut chunks = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(chunks, vec![&b"abc"[..], &b"def"[..], &b"g"[..]]);
    }

    #[tokio::test]
    async fn test_file_source_reads_everything() {
        let mut file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();

        let mut source = FileSource::open(file.path()).await.unwrap().with_chunk_size(4096);
        assert_eq!(source.size_hint(), Some(10_000));

        let mut read = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            read.extend_from_slice(&chunk);
        }
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = FileSource::open("/nonexistent/latest-all.json.bz2").await;
        assert!(matches!(result, Err(ImportError::Io(_))));
    }

    #[test]
    fn test_stats_totals() {
        let mut stats = ImportStats::default();
        *stats.rows_written.entry(Relation::Cities).or_default() += 2;
        *stats.rows_written.entry(Relation::CitiesLabels).or_default() += 5;
        *stats.role_matches.entry(Role::HumanSettlement).or_default() += 2;

        assert_eq!(stats.total_rows(), 7);
        assert_eq!(stats.rows(Relation::Countries), 0);
        assert_eq!(stats.role_count(Role::HumanSettlement), 2);
    }
}

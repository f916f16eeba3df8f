//! Decompression bridge over an external process
//!
//! Compressed bytes are written to the process's stdin; a background task
//! drains its stdout into a shared buffer that the consumer reads from.
//!
//! Memory is bounded on both sides of the process:
//! - the drain task stops reading stdout while more than `watermark` bytes
//!   are unread, so the buffer never holds more than `watermark` plus one
//!   read chunk
//! - [`BridgeWriter::write`] does not return until the buffer is back at or
//!   below the watermark, so a fast producer waits for the consumer
//!
//! The writer and the reader must be driven from different tasks: a
//! blocked write only makes progress when the reader consumes.

use crate::config::DecompressorConfig;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start decompressor '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decompressor pipe error: {0}")]
    Pipe(#[from] std::io::Error),

    #[error("decompressor exited with {0}")]
    Exited(ExitStatus),

    #[error("decompressor output closed before input was complete")]
    Closed,
}

#[derive(Default)]
struct State {
    buffer: BytesMut,
    /// Largest buffer size observed after a drain
    peak: usize,
    eof: bool,
    failure: Option<BridgeError>,
}

struct Shared {
    state: Mutex<State>,
    /// Signalled when data, EOF or a failure is available
    readable: Notify,
    /// Signalled when the consumer takes data out of the buffer
    drained: Notify,
    watermark: usize,
}

impl Shared {
    fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    fn is_done(&self) -> bool {
        let state = self.state.lock();
        state.eof || state.failure.is_some()
    }

    /// Mark the output as ended, optionally with the failure that ended it
    fn finish(&self, failure: Option<BridgeError>) {
        {
            let mut state = self.state.lock();
            if failure.is_some() {
                state.failure = failure;
            }
            state.eof = true;
        }
        self.readable.notify_waiters();
        self.drained.notify_waiters();
    }

    /// Wait until at most `watermark` bytes are unread (or the output ended)
    async fn wait_for_drain(&self, poll_interval: Option<Duration>) {
        loop {
            let drained = self.drained.notified();
            {
                let state = self.state.lock();
                if state.buffer.len() <= self.watermark || state.eof || state.failure.is_some() {
                    return;
                }
            }
            match poll_interval {
                Some(interval) => {
                    let _ = tokio::time::timeout(interval, drained).await;
                }
                None => drained.await,
            }
        }
    }
}

/// Spawns the decompressor and splits it into a writer and a reader half
pub struct DecompressionBridge;

impl DecompressionBridge {
    pub fn spawn(config: &DecompressorConfig) -> Result<(BridgeWriter, BridgeReader), BridgeError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(BridgeError::Closed)?;
        let stdout = child.stdout.take().ok_or(BridgeError::Closed)?;
        debug!(
            "Started decompressor '{}' (pid {:?}, watermark {} bytes)",
            config.command,
            child.id(),
            config.watermark_bytes
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            readable: Notify::new(),
            drained: Notify::new(),
            watermark: config.watermark_bytes,
        });

        let drain = tokio::spawn(drain_output(
            stdout,
            child,
            Arc::clone(&shared),
            config.read_chunk_bytes.max(1),
        ));

        let writer = BridgeWriter {
            stdin: Some(stdin),
            shared: Arc::clone(&shared),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        };
        let reader = BridgeReader {
            shared,
            drain,
            bytes_out: 0,
        };
        Ok((writer, reader))
    }
}

/// Background task: stdout -> shared buffer, then the exit status
async fn drain_output(
    mut stdout: ChildStdout,
    mut child: tokio::process::Child,
    shared: Arc<Shared>,
    read_chunk: usize,
) {
    let mut chunk = vec![0u8; read_chunk];
    loop {
        shared.wait_for_drain(None).await;

        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut state = shared.state.lock();
                state.buffer.extend_from_slice(&chunk[..n]);
                state.peak = state.peak.max(state.buffer.len());
                trace!("decompressor produced {} bytes ({} buffered)", n, state.buffer.len());
                drop(state);
                shared.readable.notify_waiters();
            }
            Err(e) => {
                shared.finish(Some(BridgeError::Pipe(e)));
                return;
            }
        }
    }

    let failure = match child.wait().await {
        Ok(status) if status.success() => {
            debug!("Decompressor finished");
            None
        }
        Ok(status) => Some(BridgeError::Exited(status)),
        Err(e) => Some(BridgeError::Pipe(e)),
    };
    shared.finish(failure);
}

/// Input half: feeds compressed bytes to the process
pub struct BridgeWriter {
    stdin: Option<ChildStdin>,
    shared: Arc<Shared>,
    poll_interval: Duration,
}

impl BridgeWriter {
    /// Write one compressed chunk.
    ///
    /// Returns only once the unread decompressed output is at or below the
    /// watermark.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), BridgeError> {
        if self.shared.is_done() {
            return Err(BridgeError::Closed);
        }
        let stdin = self.stdin.as_mut().ok_or(BridgeError::Closed)?;
        stdin.write_all(chunk).await?;

        self.shared.wait_for_drain(Some(self.poll_interval)).await;
        Ok(())
    }

    /// Close the process input so it can flush and exit
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.shutdown().await?;
        }
        Ok(())
    }
}

/// Output half: decompressed bytes in order, then EOF
pub struct BridgeReader {
    shared: Arc<Shared>,
    drain: JoinHandle<()>,
    bytes_out: u64,
}

impl BridgeReader {
    /// Next decompressed bytes, `None` at a clean end of output.
    ///
    /// Buffered bytes are handed out before a failure is reported; a
    /// non-zero process exit surfaces as an error after the last bytes.
    pub async fn read(&mut self) -> Result<Option<Bytes>, BridgeError> {
        loop {
            let readable = self.shared.readable.notified();
            {
                let mut state = self.shared.state.lock();
                if !state.buffer.is_empty() {
                    let out = state.buffer.split().freeze();
                    drop(state);
                    self.bytes_out += out.len() as u64;
                    self.shared.drained.notify_waiters();
                    return Ok(Some(out));
                }
                if let Some(failure) = state.failure.take() {
                    return Err(failure);
                }
                if state.eof {
                    return Ok(None);
                }
            }
            readable.await;
        }
    }

    /// Bytes currently buffered and unread
    pub fn buffered(&self) -> usize {
        self.shared.buffered()
    }

    /// Largest buffer size observed so far
    pub fn peak_buffered(&self) -> usize {
        self.shared.state.lock().peak
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn watermark(&self) -> usize {
        self.shared.watermark
    }
}

impl Drop for BridgeReader {
    fn drop(&mut self) {
        // the drain task owns the child; aborting it kills the process
        self.drain.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(watermark: usize, read_chunk: usize) -> DecompressorConfig {
        DecompressorConfig {
            command: "cat".to_string(),
            args: Vec::new(),
            watermark_bytes: watermark,
            read_chunk_bytes: read_chunk,
            poll_interval_ms: 1,
        }
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    #[tokio::test]
    async fn test_round_trip_through_process() {
        let (mut writer, mut reader) = DecompressionBridge::spawn(&identity(1 << 20, 4096)).unwrap();
        let data = payload(100_000);

        let input = data.clone();
        let pump = tokio::spawn(async move {
            for chunk in input.chunks(7_000) {
                writer.write(chunk).await?;
            }
            writer.close().await
        });

        let mut output = Vec::new();
        while let Some(bytes) = reader.read().await.unwrap() {
            output.extend_from_slice(&bytes);
        }
        pump.await.unwrap().unwrap();

        assert_eq!(output, data);
        assert_eq!(reader.bytes_out(), data.len() as u64);
    }

    #[tokio::test]
    async fn test_buffer_stays_within_watermark_plus_chunk() {
        let watermark = 8 * 1024;
        let read_chunk = 1024;
        let (mut writer, mut reader) =
            DecompressionBridge::spawn(&identity(watermark, read_chunk)).unwrap();
        let data = payload(512 * 1024);

        let input = data.clone();
        let pump = tokio::spawn(async move {
            for chunk in input.chunks(32 * 1024) {
                writer.write(chunk).await?;
            }
            writer.close().await
        });

        // slow consumer
        let mut total = 0;
        while let Some(bytes) = reader.read().await.unwrap() {
            total += bytes.len();
            assert!(bytes.len() <= watermark + read_chunk);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        pump.await.unwrap().unwrap();

        assert_eq!(total, data.len());
        assert!(
            reader.peak_buffered() <= watermark + read_chunk,
            "peak {} exceeds {}",
            reader.peak_buffered(),
            watermark + read_chunk
        );
    }

    #[tokio::test]
    async fn test_write_blocks_until_consumer_reads() {
        let (mut writer, mut reader) = DecompressionBridge::spawn(&identity(1024, 512)).unwrap();
        let data = payload(256 * 1024);

        let input = data.clone();
        let mut pump = tokio::spawn(async move {
            for chunk in input.chunks(4096) {
                writer.write(chunk).await?;
            }
            writer.close().await
        });

        // nobody reads: the producer must stall
        let stalled = tokio::time::timeout(Duration::from_millis(200), &mut pump).await;
        assert!(stalled.is_err(), "writer finished without a consumer");
        assert!(reader.buffered() <= 1024 + 512);

        let mut total = 0;
        while let Some(bytes) = reader.read().await.unwrap() {
            total += bytes.len();
        }
        pump.await.unwrap().unwrap();
        assert_eq!(total, data.len());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let config = DecompressorConfig {
            command: "definitely-not-a-decompressor".to_string(),
            ..identity(1024, 512)
        };
        assert!(matches!(
            DecompressionBridge::spawn(&config),
            Err(BridgeError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_fatal() {
        let config = DecompressorConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "printf partial; exit 3".to_string()],
            ..identity(1024, 512)
        };
        let (_writer, mut reader) = DecompressionBridge::spawn(&config).unwrap();

        let mut output = Vec::new();
        let err = loop {
            match reader.read().await {
                Ok(Some(bytes)) => output.extend_from_slice(&bytes),
                Ok(None) => panic!("expected an exit failure"),
                Err(e) => break e,
            }
        };
        assert_eq!(output, b"partial");
        assert!(matches!(err, BridgeError::Exited(status) if status.code() == Some(3)));
    }

    #[tokio::test]
    async fn test_failure_is_reported_once_then_output_ends() {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            readable: Notify::new(),
            drained: Notify::new(),
            watermark: 16,
        });
        let mut reader = BridgeReader {
            shared: Arc::clone(&shared),
            drain: tokio::spawn(async {}),
            bytes_out: 0,
        };

        shared.finish(Some(BridgeError::Pipe(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        ))));

        assert!(matches!(reader.read().await, Err(BridgeError::Pipe(_))));
        let next = tokio::time::timeout(Duration::from_secs(1), reader.read())
            .await
            .expect("second read must not hang");
        assert!(matches!(next, Ok(None)));
    }

    #[tokio::test]
    async fn test_bzip2_round_trip() {
        use std::io::Write;

        if std::process::Command::new("bzip2").arg("--help").output().is_err() {
            return;
        }

        let data = payload(200_000);
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        let (mut writer, mut reader) =
            DecompressionBridge::spawn(&DecompressorConfig::default()).unwrap();
        let pump = tokio::spawn(async move {
            for chunk in compressed.chunks(1000) {
                writer.write(chunk).await?;
            }
            writer.close().await
        });

        let mut output = Vec::new();
        while let Some(bytes) = reader.read().await.unwrap() {
            output.extend_from_slice(&bytes);
        }
        pump.await.unwrap().unwrap();
        assert_eq!(output, data);
    }
}

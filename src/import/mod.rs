//! Streaming import of a compressed entity dump
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   compressed   ┌─────────────────────┐
//! │  ByteSource  │ ─────────────► │ DecompressionBridge │  external process,
//! │ (HTTP/file)  │   pump task    │  (bounded buffer)   │  watermark backpressure
//! └──────────────┘                └─────────────────────┘
//!                                            │ decompressed
//!                                            ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     ImportCoordinator (driver loop)                  │
//! │   RecordChunker → parse → classify → role handlers → Sink::insert    │
//! │            one record at a time, every insert awaited                │
//! └──────────────────────────────────────────────────────────────────────┘
//!                                            │
//!                                            ▼
//!                              ThroughputMeter → ProgressObserver
//! ```

pub mod bridge;
pub mod chunker;
pub mod coordinator;
pub mod meter;
pub mod progress;
pub mod source;

// Re-export main types
pub use bridge::{BridgeError, BridgeReader, BridgeWriter, DecompressionBridge};
pub use chunker::RecordChunker;
pub use coordinator::{ImportCoordinator, ImportCoordinatorBuilder};
pub use meter::{ProgressObserver, ThroughputMeter, ThroughputSample};
pub use progress::{LogObserver, ProgressBarObserver};
pub use source::{ByteSource, FileSource, HttpSource, ImportError, ImportStats, MemorySource};

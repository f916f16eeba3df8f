//! Import coordinator: the pipeline driver loop
//!
//! One task pumps the source into the decompression bridge. The driver
//! pulls decompressed bytes, splits them into records and runs every
//! record through parse, classify, extract and the sink before looking at
//! the next one. Each sink write is awaited, so the sink's pace is
//! propagated back through the bridge to the source.

use super::bridge::{BridgeReader, BridgeWriter, DecompressionBridge};
use super::chunker::RecordChunker;
use super::meter::{ProgressObserver, ThroughputMeter};
use super::source::{ByteSource, ImportError, ImportStats};
use crate::classify::{classify, Taxonomies};
use crate::config::DecompressorConfig;
use crate::entity::{parse_record, Entity, RawRecord};
use crate::extract::extract;
use crate::sink::Sink;
use crate::temporal::{TemporalResolver, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives a dump through the extraction pipeline into a sink
pub struct ImportCoordinator {
    taxonomies: Taxonomies,
    resolver: TemporalResolver,
    decompressor: DecompressorConfig,
    progress_interval: Duration,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ImportCoordinator {
    pub fn resolver(&self) -> &TemporalResolver {
        &self.resolver
    }

    pub fn taxonomies(&self) -> &Taxonomies {
        &self.taxonomies
    }

    /// Run the whole import. The sink is finished on success only; after
    /// an error the destination must be discarded.
    pub async fn run<S, K>(&mut self, source: S, sink: &mut K) -> Result<ImportStats, ImportError>
    where
        S: ByteSource + 'static,
        K: Sink + ?Sized,
    {
        let started = Instant::now();
        info!(
            "Starting import from {} (reference time {})",
            source.source_name(),
            self.resolver.reference().unix_seconds()
        );

        let mut meter = ThroughputMeter::new(self.progress_interval, source.size_hint());
        if let Some(observer) = self.observer.take() {
            meter = meter.with_observer(observer);
        }

        let (writer, mut reader) = DecompressionBridge::spawn(&self.decompressor)?;
        let pump = tokio::spawn(pump(source, writer, meter.compressed_counter()));

        let mut stats = ImportStats::default();
        if let Err(e) = self.drive(&mut reader, sink, &mut meter, &mut stats).await {
            // a failed download explains a truncated decompressor run; a
            // pump that only saw the bridge go away does not
            if pump.is_finished() {
                if let Ok(Err(pump_error)) = pump.await {
                    if pump_error.is_input_failure() {
                        return Err(pump_error);
                    }
                }
            } else {
                pump.abort();
            }
            return Err(e);
        }

        pump.await
            .map_err(|e| ImportError::Task(e.to_string()))??;
        sink.finish().await.map_err(ImportError::Finish)?;

        let sample = meter.finish();
        stats.compressed_bytes = sample.compressed_bytes;
        stats.decompressed_bytes = sample.decompressed_bytes;
        stats.elapsed_seconds = started.elapsed().as_secs_f64();

        info!(
            "Import finished: {} records, {} rows in {:.1}s",
            stats.records_seen,
            stats.total_rows(),
            stats.elapsed_seconds
        );
        Ok(stats)
    }

    async fn drive<K: Sink + ?Sized>(
        &self,
        reader: &mut BridgeReader,
        sink: &mut K,
        meter: &mut ThroughputMeter,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let mut chunker = RecordChunker::new();

        while let Some(bytes) = reader.read().await? {
            meter.add_decompressed(bytes.len());
            chunker.push(&bytes);
            while let Some(record) = chunker.next_record() {
                self.process_record(&record, sink, stats).await?;
                meter.add_record();
                meter.tick();
            }
        }

        if let Some(record) = chunker.finish() {
            self.process_record(&record, sink, stats).await?;
            meter.add_record();
        }
        Ok(())
    }

    /// Parse one record and process it. Malformed records are counted and
    /// skipped.
    pub async fn process_record<K: Sink + ?Sized>(
        &self,
        record: &RawRecord,
        sink: &mut K,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        stats.records_seen += 1;
        match parse_record(record) {
            Ok(entity) => {
                stats.records_parsed += 1;
                self.process_entity(&entity, sink, stats).await
            }
            Err(e) => {
                stats.records_malformed += 1;
                debug!("Skipping record {}: {}", stats.records_seen, e);
                Ok(())
            }
        }
    }

    /// Classify an entity, run every matching handler and write its rows
    pub async fn process_entity<K: Sink + ?Sized>(
        &self,
        entity: &Entity,
        sink: &mut K,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let roles = classify(entity, &self.taxonomies);
        for role in roles.iter() {
            *stats.role_matches.entry(role).or_default() += 1;

            let extraction = extract(role, entity, &self.resolver);
            if extraction.is_skipped() {
                stats.handler_skips += 1;
                continue;
            }

            for batch in extraction.batches {
                let relation = batch.relation();
                let rows = batch.len() as u64;
                sink.insert(batch).await.map_err(|source| ImportError::Sink {
                    entity: entity.id.clone(),
                    source,
                })?;
                *stats.rows_written.entry(relation).or_default() += rows;
            }
        }
        Ok(())
    }
}

/// Source -> bridge, then close the bridge input
async fn pump<S: ByteSource>(
    mut source: S,
    mut writer: BridgeWriter,
    compressed: Arc<AtomicU64>,
) -> Result<(), ImportError> {
    let result = async {
        while let Some(chunk) = source.next_chunk().await? {
            compressed.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            writer.write(&chunk).await?;
        }
        Ok::<(), ImportError>(())
    }
    .await;

    if let Err(e) = &result {
        warn!("Input stream failed: {}", e);
    }
    // close even on failure so the decompressor sees end of input
    let closed = writer.close().await;
    result?;
    closed?;
    Ok(())
}

/// Builder for ImportCoordinator
pub struct ImportCoordinatorBuilder {
    taxonomies: Taxonomies,
    reference: Option<Timestamp>,
    decompressor: DecompressorConfig,
    progress_interval: Duration,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ImportCoordinatorBuilder {
    pub fn new(taxonomies: Taxonomies) -> Self {
        Self {
            taxonomies,
            reference: None,
            decompressor: DecompressorConfig::default(),
            progress_interval: Duration::from_secs(10),
            observer: None,
        }
    }

    /// Fix the instant temporal qualifiers are checked against
    pub fn with_reference_time(mut self, reference: Timestamp) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_decompressor(mut self, config: DecompressorConfig) -> Self {
        self.decompressor = config;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the coordinator. Without an explicit reference time the
    /// current time is captured here, once for the whole run.
    pub fn build(self) -> ImportCoordinator {
        let resolver = match self.reference {
            Some(reference) => TemporalResolver::new(reference),
            None => TemporalResolver::now(),
        };
        ImportCoordinator {
            taxonomies: self.taxonomies,
            resolver,
            decompressor: self.decompressor,
            progress_interval: self.progress_interval,
            observer: self.observer,
        }
    }
}

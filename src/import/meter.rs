//! Throughput meter
//!
//! Counts bytes and records for progress reporting only. The pipeline
//! driver owns the meter and calls its observer on a fixed cadence; nothing
//! here affects what gets imported.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of pipeline throughput
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputSample {
    pub elapsed: Duration,
    pub compressed_bytes: u64,
    pub decompressed_bytes: u64,
    pub records: u64,
    /// Total compressed size, when the source knows it
    pub total_bytes: Option<u64>,
}

impl ThroughputSample {
    pub fn records_per_second(&self) -> f64 {
        per_second(self.records, self.elapsed)
    }

    /// Compressed bytes per second
    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.compressed_bytes, self.elapsed)
    }

    /// Share of the source consumed, 0 to 100
    pub fn percent(&self) -> Option<f64> {
        let total = self.total_bytes.filter(|&t| t > 0)?;
        Some((self.compressed_bytes as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Estimated time left at the current compressed byte rate
    pub fn eta(&self) -> Option<Duration> {
        let total = self.total_bytes?;
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.compressed_bytes) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Receives throughput samples from the pipeline driver
pub trait ProgressObserver: Send {
    fn on_sample(&mut self, sample: &ThroughputSample);

    /// Called once with the final numbers
    fn on_finish(&mut self, sample: &ThroughputSample) {
        self.on_sample(sample);
    }
}

pub struct ThroughputMeter {
    compressed: Arc<AtomicU64>,
    decompressed: u64,
    records: u64,
    total_bytes: Option<u64>,
    started: Instant,
    last_sample: Instant,
    interval: Duration,
    observer: Option<Box<dyn ProgressObserver>>,
}

impl ThroughputMeter {
    pub fn new(interval: Duration, total_bytes: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            compressed: Arc::new(AtomicU64::new(0)),
            decompressed: 0,
            records: 0,
            total_bytes,
            started: now,
            last_sample: now,
            interval,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Counter for the task that feeds compressed bytes
    pub fn compressed_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.compressed)
    }

    pub fn add_decompressed(&mut self, bytes: usize) {
        self.decompressed += bytes as u64;
    }

    pub fn add_record(&mut self) {
        self.records += 1;
    }

    pub fn sample(&self) -> ThroughputSample {
        ThroughputSample {
            elapsed: self.started.elapsed(),
            compressed_bytes: self.compressed.load(Ordering::Relaxed),
            decompressed_bytes: self.decompressed,
            records: self.records,
            total_bytes: self.total_bytes,
        }
    }

    /// Notify the observer if the sampling interval has passed
    pub fn tick(&mut self) {
        if self.observer.is_none() || self.last_sample.elapsed() < self.interval {
            return;
        }
        self.last_sample = Instant::now();
        let sample = self.sample();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_sample(&sample);
        }
    }

    /// Final sample; tears down the observer
    pub fn finish(&mut self) -> ThroughputSample {
        let sample = self.sample();
        if let Some(mut observer) = self.observer.take() {
            observer.on_finish(&sample);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder(Arc<Mutex<Vec<ThroughputSample>>>);

    impl ProgressObserver for Recorder {
        fn on_sample(&mut self, sample: &ThroughputSample) {
            self.0.lock().push(*sample);
        }
    }

    #[test]
    fn test_percent_and_eta() {
        let sample = ThroughputSample {
            elapsed: Duration::from_secs(10),
            compressed_bytes: 250,
            decompressed_bytes: 2_500,
            records: 50,
            total_bytes: Some(1_000),
        };
        assert_eq!(sample.percent(), Some(25.0));
        assert_eq!(sample.records_per_second(), 5.0);
        assert_eq!(sample.eta(), Some(Duration::from_secs(30)));

        let unknown = ThroughputSample {
            total_bytes: None,
            ..sample
        };
        assert_eq!(unknown.percent(), None);
        assert_eq!(unknown.eta(), None);
    }

    #[test]
    fn test_observer_cadence() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let mut meter = ThroughputMeter::new(Duration::from_secs(3600), Some(100))
            .with_observer(Box::new(Recorder(Arc::clone(&samples))));

        meter.compressed_counter().fetch_add(40, Ordering::Relaxed);
        meter.add_decompressed(400);
        meter.add_record();
        meter.tick();
        assert!(samples.lock().is_empty(), "sampled before the interval");

        let last = meter.finish();
        assert_eq!(last.compressed_bytes, 40);
        assert_eq!(last.decompressed_bytes, 400);
        assert_eq!(last.records, 1);
        assert_eq!(samples.lock().len(), 1);

        // observer is gone after finish
        meter.finish();
        assert_eq!(samples.lock().len(), 1);
    }

    #[test]
    fn test_zero_interval_samples_every_tick() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let mut meter = ThroughputMeter::new(Duration::ZERO, None)
            .with_observer(Box::new(Recorder(Arc::clone(&samples))));
        meter.tick();
        meter.tick();
        assert_eq!(samples.lock().len(), 2);
    }
}

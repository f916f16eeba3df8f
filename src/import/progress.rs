//! Progress observers for dump imports

use super::meter::{ProgressObserver, ThroughputSample};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
        }
        None => "?".to_string(),
    }
}

/// Human-readable progress line
pub fn describe(sample: &ThroughputSample) -> String {
    let mut line = format!(
        "{} records ({:.0}/s), {} MB read, {} MB decompressed",
        sample.records,
        sample.records_per_second(),
        sample.compressed_bytes / 1_000_000,
        sample.decompressed_bytes / 1_000_000,
    );
    if let Some(percent) = sample.percent() {
        line.push_str(&format!(", {:.1}% (ETA {})", percent, format_eta(sample.eta())));
    }
    line
}

/// Reports progress as log lines
#[derive(Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_sample(&mut self, sample: &ThroughputSample) {
        info!("Progress: {}", describe(sample));
    }

    fn on_finish(&mut self, sample: &ThroughputSample) {
        info!("Finished: {}", describe(sample));
    }
}

/// Draws a terminal progress bar over the compressed input
pub struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    pub fn new(total_bytes: Option<u64>) -> Self {
        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%, ETA {eta}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        Self { bar }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_sample(&mut self, sample: &ThroughputSample) {
        self.bar.set_position(sample.compressed_bytes);
        self.bar.set_message(format!(
            "{} records ({:.0}/s)",
            sample.records,
            sample.records_per_second()
        ));
    }

    fn on_finish(&mut self, sample: &ThroughputSample) {
        self.on_sample(sample);
        self.bar.finish_with_message(format!(
            "Done! {} records, {:.0}/s",
            sample.records,
            sample.records_per_second()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total_bytes: Option<u64>) -> ThroughputSample {
        ThroughputSample {
            elapsed: Duration::from_secs(100),
            compressed_bytes: 50_000_000,
            decompressed_bytes: 400_000_000,
            records: 20_000,
            total_bytes,
        }
    }

    #[test]
    fn test_describe_with_size() {
        let line = describe(&sample(Some(100_000_000)));
        assert!(line.starts_with("20000 records (200/s), 50 MB read, 400 MB decompressed"));
        assert!(line.ends_with("50.0% (ETA 0h01m)"), "{}", line);
    }

    #[test]
    fn test_describe_without_size() {
        let line = describe(&sample(None));
        assert!(!line.contains('%'));
    }

    #[test]
    fn test_bar_observer_tracks_position() {
        let mut observer = ProgressBarObserver::new(Some(100_000_000));
        observer.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        observer.on_sample(&sample(Some(100_000_000)));
        assert_eq!(observer.bar.position(), 50_000_000);
        observer.on_finish(&sample(Some(100_000_000)));
        assert!(observer.bar.is_finished());
    }
}

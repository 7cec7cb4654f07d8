//! Counters describing one ingestion run.
//!
//! These track what happened to each record on its way into the
//! aggregator:
//! - read from the source
//! - rejected as malformed (and skipped, or the run aborted)
//! - table headers rejected for missing columns (not counted as records)
//! - dropped because the diff was all zero
//! - aggregated as an error
//!
//! # Thread Safety
//!
//! `IngestMetrics` is NOT thread-safe. Sharded runs keep one instance per
//! worker and combine them with [`IngestMetrics::merge`].

use std::time::{Duration, Instant};

/// Per-run ingestion counters.
#[derive(Debug, Clone)]
pub struct IngestMetrics {
    /// When ingestion started
    pub start_time: Instant,

    /// When ingestion ended (set on completion)
    pub end_time: Option<Instant>,

    /// Data rows seen, malformed or not
    pub records_read: u64,

    /// Rows that could not be turned into an observation
    pub records_malformed: u64,

    /// Header rows lacking a required column
    pub headers_rejected: u64,

    /// Observations with an all-zero diff
    pub records_agreeing: u64,

    /// Observations recorded by the aggregator
    pub errors_aggregated: u64,

    /// Disagreeing bits across all aggregated observations
    pub bit_errors: u64,
}

impl IngestMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            records_read: 0,
            records_malformed: 0,
            headers_rejected: 0,
            records_agreeing: 0,
            errors_aggregated: 0,
            bit_errors: 0,
        }
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Fraction of read records that were malformed.
    pub fn malformed_rate(&self) -> f64 {
        if self.records_read == 0 {
            0.0
        } else {
            self.records_malformed as f64 / self.records_read as f64
        }
    }

    /// Mean number of disagreeing bits per aggregated error.
    pub fn bits_per_error(&self) -> f64 {
        if self.errors_aggregated == 0 {
            0.0
        } else {
            self.bit_errors as f64 / self.errors_aggregated as f64
        }
    }

    /// Records processed per second.
    pub fn records_per_sec(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.records_read as f64 / secs
        }
    }

    /// Add another run's counters. The earlier start time is kept.
    pub fn merge(&mut self, other: &IngestMetrics) {
        self.start_time = self.start_time.min(other.start_time);
        self.end_time = match (self.end_time, other.end_time) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.records_read += other.records_read;
        self.records_malformed += other.records_malformed;
        self.headers_rejected += other.headers_rejected;
        self.records_agreeing += other.records_agreeing;
        self.errors_aggregated += other.errors_aggregated;
        self.bit_errors += other.bit_errors;
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Ingestion Summary ===");
        println!("Duration: {} ms", self.duration().as_millis());
        println!("Records read: {}", self.records_read);
        println!(
            "Malformed: {} ({:.2}%)",
            self.records_malformed,
            self.malformed_rate() * 100.0
        );
        if self.headers_rejected > 0 {
            println!("Headers rejected: {}", self.headers_rejected);
        }
        println!("Agreeing (zero diff): {}", self.records_agreeing);
        println!("Errors aggregated: {}", self.errors_aggregated);
        println!(
            "Bit errors: {} ({:.2} per error)",
            self.bit_errors,
            self.bits_per_error()
        );
        println!("Throughput: {:.0} records/s", self.records_per_sec());
        println!();
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             records_read={}\n\
             records_malformed={}\n\
             headers_rejected={}\n\
             records_agreeing={}\n\
             errors_aggregated={}\n\
             bit_errors={}\n\
             malformed_rate={:.4}\n",
            self.duration().as_millis(),
            self.records_read,
            self.records_malformed,
            self.headers_rejected,
            self.records_agreeing,
            self.errors_aggregated,
            self.bit_errors,
            self.malformed_rate(),
        )
    }
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = IngestMetrics::new();
        assert!(metrics.end_time.is_none());
        assert!(metrics.duration().as_millis() < 100);
    }

    #[test]
    fn test_rates() {
        let mut metrics = IngestMetrics::new();
        assert_eq!(metrics.malformed_rate(), 0.0);
        assert_eq!(metrics.bits_per_error(), 0.0);

        metrics.records_read = 200;
        metrics.records_malformed = 10;
        metrics.errors_aggregated = 4;
        metrics.bit_errors = 6;

        assert_eq!(metrics.malformed_rate(), 0.05);
        assert_eq!(metrics.bits_per_error(), 1.5);
    }

    #[test]
    fn test_merge() {
        let mut a = IngestMetrics::new();
        a.records_read = 10;
        a.errors_aggregated = 3;
        let mut b = IngestMetrics::new();
        b.records_read = 5;
        b.records_malformed = 1;
        b.headers_rejected = 2;
        b.complete();

        a.merge(&b);
        assert_eq!(a.records_read, 15);
        assert_eq!(a.records_malformed, 1);
        assert_eq!(a.headers_rejected, 2);
        assert_eq!(a.errors_aggregated, 3);
        assert!(a.end_time.is_some());
    }

    #[test]
    fn test_export_text() {
        let mut metrics = IngestMetrics::new();
        metrics.records_read = 1000;
        metrics.errors_aggregated = 12;
        metrics.complete();

        let text = metrics.export_text();
        assert!(text.contains("records_read=1000"));
        assert!(text.contains("errors_aggregated=12"));
        assert!(text.contains("headers_rejected=0"));
        assert!(text.contains("malformed_rate=0.0000"));
    }
}

//! # Run Metrics
//!
//! Counters for one run of the inspection line, the snapshot handed to the
//! display, and the JSON state file written at shutdown.
//!
//! Every update is mirrored to the `metrics` facade so an installed recorder
//! can export it:
//!
//! **Counters:**
//! - `inspector_pieces_total{outcome}` - passed, ejected, skipped, missed, error
//! - `inspector_tick_errors_total` - faults caught by the tick driver
//!
//! **Histograms:**
//! - `inspector_processing_duration_seconds{outcome}` - capture to decision

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// How a piece left the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceOutcome {
    Passed,
    Ejected,
    /// AI bypass toggle was active
    Skipped,
    /// Sensor 2 never saw the piece
    Missed,
    Error,
}

impl PieceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceOutcome::Passed => "passed",
            PieceOutcome::Ejected => "ejected",
            PieceOutcome::Skipped => "skipped",
            PieceOutcome::Missed => "missed",
            PieceOutcome::Error => "error",
        }
    }
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub processed_count: u64,
    pub passed_count: u64,
    pub ejected_count: u64,
    pub skipped_count: u64,
    pub missed_count: u64,
    pub error_count: u64,
    pub total_errors: u64,
    /// Seconds from capture start to decision for the last analyzed piece
    pub last_process_time: Option<f64>,
    pub last_error: Option<String>,
    pub run_time_seconds: f64,
}

/// Shape of the state file written at shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedState {
    pub metrics: SavedMetrics,
    pub last_run: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedMetrics {
    pub processed_count: u64,
    pub error_count: u64,
    pub total_errors: u64,
    pub run_time_seconds: f64,
    pub last_process_time: Option<f64>,
}

/// Counters owned by the controller for the lifetime of a run.
#[derive(Debug)]
pub struct RunMetrics {
    processed_count: u64,
    passed_count: u64,
    ejected_count: u64,
    skipped_count: u64,
    missed_count: u64,
    error_count: u64,
    total_errors: u64,
    last_process_time: Option<Duration>,
    last_error: Option<String>,
    started_at: Instant,
    started: DateTime<Local>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            processed_count: 0,
            passed_count: 0,
            ejected_count: 0,
            skipped_count: 0,
            missed_count: 0,
            error_count: 0,
            total_errors: 0,
            last_process_time: None,
            last_error: None,
            started_at: Instant::now(),
            started: Local::now(),
        }
    }

    /// Record a piece that went through capture and inference.
    pub fn record_analyzed(&mut self, outcome: PieceOutcome, elapsed: Duration) {
        self.processed_count += 1;
        match outcome {
            PieceOutcome::Passed => self.passed_count += 1,
            PieceOutcome::Ejected => self.ejected_count += 1,
            _ => {}
        }
        self.last_process_time = Some(elapsed);

        metrics::counter!("inspector_pieces_total", "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!("inspector_processing_duration_seconds", "outcome" => outcome.as_str())
            .record(elapsed.as_secs_f64());
    }

    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
        metrics::counter!("inspector_pieces_total", "outcome" => "skipped").increment(1);
    }

    pub fn record_missed(&mut self) {
        self.missed_count += 1;
        metrics::counter!("inspector_pieces_total", "outcome" => "missed").increment(1);
    }

    /// A processing cycle that failed before a decision could be made.
    pub fn record_processing_error(&mut self, error: &str, elapsed: Duration) {
        self.error_count += 1;
        self.total_errors += 1;
        self.last_error = Some(error.to_string());
        self.last_process_time = Some(elapsed);

        metrics::counter!("inspector_pieces_total", "outcome" => "error").increment(1);
        metrics::histogram!("inspector_processing_duration_seconds", "outcome" => "error")
            .record(elapsed.as_secs_f64());
    }

    /// A fault caught at the top of the tick loop.
    pub fn record_tick_error(&mut self, error: &str) {
        self.total_errors += 1;
        self.last_error = Some(error.to_string());
        metrics::counter!("inspector_tick_errors_total").increment(1);
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed_count: self.processed_count,
            passed_count: self.passed_count,
            ejected_count: self.ejected_count,
            skipped_count: self.skipped_count,
            missed_count: self.missed_count,
            error_count: self.error_count,
            total_errors: self.total_errors,
            last_process_time: self.last_process_time.map(|d| d.as_secs_f64()),
            last_error: self.last_error.clone(),
            run_time_seconds: self.started_at.elapsed().as_secs_f64(),
        }
    }

    /// Persist final counters as pretty-printed JSON.
    pub fn save_state(&self, path: &Path) -> std::io::Result<()> {
        let snapshot = self.snapshot();
        let state = SavedState {
            metrics: SavedMetrics {
                processed_count: snapshot.processed_count,
                error_count: snapshot.error_count,
                total_errors: snapshot.total_errors,
                run_time_seconds: snapshot.run_time_seconds,
                last_process_time: snapshot.last_process_time,
            },
            last_run: Local::now().to_rfc3339(),
            last_error: snapshot.last_error,
        };

        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "State saved");
        Ok(())
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

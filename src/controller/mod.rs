//! Inspection controller.
//!
//! A single [`Controller`] owns the hardware port and every timer of the
//! line. The driver calls [`Controller::tick`] at a fixed rate; each tick
//! reads one sensor snapshot, advances the state machine and writes the
//! actuators. Capture and inference run on a spawned task whose result comes
//! back through a oneshot channel polled without blocking.
//!
//! Branch priority within a tick:
//!
//! 1. finished processing task outcome
//! 2. ejector assertion, then post-ejection settle (everything else frozen)
//! 3. network probe scheduling
//! 4. solenoid lock while a piece is processed
//! 5. debounced solenoid output
//! 6. piece detection or error recovery

mod error;
mod state;
mod task;


pub use error::TickError;
pub use state::{EjectionCycle, InspectionState, SolenoidTiming, TickOutcome};
pub use task::{InspectionPipeline, PieceProcessor, ProcessingOutcome};

use crate::config::TimingConfig;
use crate::display::Display;
use crate::hardware::{HardwareError, HardwarePort, SensorSnapshot};
use crate::imaging::PredictionSet;
use crate::metrics::{PieceOutcome, RunMetrics};
use crate::network::{NetworkMonitor, NetworkReport, CONNECTIVITY_ISSUE_MESSAGE};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

pub const PIECE_DETECTED_MESSAGE: &str = "Piece detected";
pub const WAITING_FOR_SLOT_MESSAGE: &str = "Sensor 1 released - waiting for piece to reach slot...";
pub const NO_PIECE_MESSAGE: &str = "No piece fell in slot!";
pub const AI_SKIPPED_MESSAGE: &str = "AI check skipped - toggle switch active";
pub const PLEASE_WAIT_MESSAGE: &str = "Please wait for current piece processing to complete";
pub const PASSED_MESSAGE: &str = "Piece passed inspection";
pub const EJECTING_MESSAGE: &str = "Defects detected - ejecting piece";
pub const READY_MESSAGE: &str = "Ready for next piece";

/// The one processing task allowed at a time.
struct InFlight {
    handle: JoinHandle<()>,
    result: oneshot::Receiver<ProcessingOutcome>,
    started: Instant,
}

/// Owns the hardware and all state of the inspection line.
pub struct Controller {
    hardware: Box<dyn HardwarePort>,
    processor: Arc<dyn PieceProcessor>,
    display: Arc<dyn Display>,
    network: Option<Arc<NetworkMonitor>>,
    timing: TimingConfig,
    network_interval: Duration,

    state: InspectionState,
    ejection: EjectionCycle,
    solenoid: SolenoidTiming,
    last_sensor1: bool,
    piece_in_progress: bool,
    waiting_for_sensor2: bool,
    sensor2_wait_start: Option<Instant>,
    solenoid_locked: bool,
    wait_warning_shown: bool,
    alert: Option<String>,

    in_flight: Option<InFlight>,
    last_network_check: Option<Instant>,
    network_probe: Option<JoinHandle<NetworkReport>>,
    network_issue: bool,

    metrics: RunMetrics,
    last_predictions: Option<PredictionSet>,
}

impl Controller {
    pub fn new(
        hardware: Box<dyn HardwarePort>,
        processor: Arc<dyn PieceProcessor>,
        display: Arc<dyn Display>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            hardware,
            processor,
            display,
            network: None,
            timing,
            network_interval: Duration::from_secs(5),
            state: InspectionState::Normal,
            ejection: EjectionCycle::Idle,
            solenoid: SolenoidTiming::default(),
            last_sensor1: false,
            piece_in_progress: false,
            waiting_for_sensor2: false,
            sensor2_wait_start: None,
            solenoid_locked: false,
            wait_warning_shown: false,
            alert: None,
            in_flight: None,
            last_network_check: None,
            network_probe: None,
            network_issue: false,
            metrics: RunMetrics::new(),
            last_predictions: None,
        }
    }

    /// Probe the network every `monitor.config().interval()`.
    pub fn with_network(mut self, monitor: Arc<NetworkMonitor>) -> Self {
        self.network_interval = monitor.config().interval();
        self.network = Some(monitor);
        self
    }

    pub fn tick(&mut self) -> Result<TickOutcome, TickError> {
        self.tick_at(Instant::now())
    }

    /// Advance the state machine as of `now`.
    ///
    /// Must be called from within a tokio runtime; processing and network
    /// probes are spawned onto it.
    pub fn tick_at(&mut self, now: Instant) -> Result<TickOutcome, TickError> {
        self.poll_processing(now)?;

        match self.ejection {
            EjectionCycle::Ejecting { start } => {
                if !self.hardware.ejector_state() {
                    // Assertion failed on an earlier tick; on-time counts from the first success.
                    self.hardware.set_ejector(true)?;
                    self.ejection = EjectionCycle::Ejecting { start: now };
                    tracing::warn!("Ejector asserted on retry");
                    return Ok(TickOutcome::Ejecting);
                }
                if now.saturating_duration_since(start) >= self.timing.ejection_time() {
                    // Stays in Ejecting if the write fails, so the release is retried.
                    self.hardware.set_ejector(false)?;
                    self.ejection = EjectionCycle::PostDelay { start: now };
                    tracing::debug!("Ejector released");
                }
                return Ok(TickOutcome::Ejecting);
            }
            EjectionCycle::PostDelay { start } => {
                if now.saturating_duration_since(start) >= self.timing.post_ejection_delay() {
                    self.ejection = EjectionCycle::Idle;
                    self.unlock();
                    self.display.update_status_message(READY_MESSAGE, false, false);
                }
                return Ok(TickOutcome::Settling);
            }
            EjectionCycle::Idle => {}
        }

        self.network_tick(now);

        let snapshot = self.hardware.snapshot()?;

        if self.solenoid_locked {
            self.hardware.set_solenoid(false)?;
            if snapshot.sensor1 && !self.wait_warning_shown {
                self.wait_warning_shown = true;
                self.display.update_status_message(PLEASE_WAIT_MESSAGE, true, false);
            }
            return Ok(TickOutcome::Locked);
        }

        let rising = snapshot.sensor1 && !self.last_sensor1;
        self.solenoid.record_edge(
            self.last_sensor1,
            snapshot.sensor1,
            self.hardware.solenoid_state(),
            now,
        );
        self.last_sensor1 = snapshot.sensor1;

        let desired = self.solenoid.desired(
            snapshot.sensor1,
            now,
            self.timing.start_delay(),
            self.timing.hold_delay(),
        );
        self.hardware.set_solenoid(desired)?;

        match self.state {
            InspectionState::Normal => self.detect_piece(&snapshot, rising, now),
            InspectionState::ErrorRecovery => self.recover(&snapshot, rising, now),
        }

        Ok(TickOutcome::Polled { solenoid: desired })
    }

    /// Count a tick that returned an error and surface it as an alert.
    pub fn record_fault(&mut self, error: &TickError) {
        tracing::error!(error = %error, "State machine error");
        self.metrics.record_tick_error(&error.to_string());
        let message = format!("State machine error: {}", error);
        self.display.update_status_message(&message, true, false);
        self.alert = Some(message);
        self.display.update_metrics(&self.metrics.snapshot());
    }

    /// Wait up to `timeout` for in-flight processing, then force both
    /// actuators off and release the hardware.
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<(), HardwareError> {
        if let Some(mut in_flight) = self.in_flight.take() {
            tracing::info!("Waiting for processing task to finish");
            match tokio::time::timeout(timeout, &mut in_flight.handle).await {
                Ok(_) => {
                    if let Ok(outcome) = in_flight.result.try_recv() {
                        self.record_outcome(&outcome);
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Processing task did not finish in time; aborting"
                    );
                    in_flight.handle.abort();
                }
            }
        }

        if let Some(probe) = self.network_probe.take() {
            probe.abort();
        }

        self.hardware.shutdown()
    }

    pub fn state(&self) -> InspectionState {
        self.state
    }

    pub fn ejection(&self) -> EjectionCycle {
        self.ejection
    }

    pub fn is_locked(&self) -> bool {
        self.solenoid_locked
    }

    /// Whether a processing task is in flight.
    pub fn processing_active(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn piece_in_progress(&self) -> bool {
        self.piece_in_progress
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn last_predictions(&self) -> Option<&PredictionSet> {
        self.last_predictions.as_ref()
    }

    fn detect_piece(&mut self, snapshot: &SensorSnapshot, rising: bool, now: Instant) {
        if rising && !self.piece_in_progress {
            self.start_piece();
        }

        if !self.piece_in_progress || snapshot.sensor1 {
            return;
        }

        if snapshot.ai_disabled {
            self.metrics.record_skipped();
            self.display.update_status_message(AI_SKIPPED_MESSAGE, false, false);
            self.display.update_metrics(&self.metrics.snapshot());
            self.clear_piece();
            return;
        }

        let wait_start = match self.sensor2_wait_start {
            Some(start) if self.waiting_for_sensor2 => start,
            _ => {
                self.waiting_for_sensor2 = true;
                self.sensor2_wait_start = Some(now);
                self.display.update_status_message(WAITING_FOR_SLOT_MESSAGE, false, false);
                now
            }
        };

        if now.saturating_duration_since(wait_start) < self.timing.sensor2_wait() {
            return;
        }

        if snapshot.sensor2 {
            self.try_spawn(now);
        } else {
            tracing::warn!("Piece released but never reached the slot");
            self.metrics.record_missed();
            self.raise_alert(NO_PIECE_MESSAGE);
            self.state = InspectionState::ErrorRecovery;
            self.display.update_metrics(&self.metrics.snapshot());
        }
        self.clear_piece();
    }

    fn recover(&mut self, snapshot: &SensorSnapshot, rising: bool, now: Instant) {
        if rising {
            tracing::info!("New piece during error recovery");
            self.state = InspectionState::Normal;
            self.start_piece();
        } else if snapshot.sensor2 {
            tracing::info!("Piece placed in slot manually");
            if snapshot.ai_disabled {
                self.metrics.record_skipped();
                self.display.update_status_message(AI_SKIPPED_MESSAGE, false, false);
            } else {
                self.try_spawn(now);
            }
            self.alert = None;
            self.state = InspectionState::Normal;
        }
    }

    fn start_piece(&mut self) {
        self.piece_in_progress = true;
        self.waiting_for_sensor2 = false;
        self.sensor2_wait_start = None;
        self.alert = None;
        self.display.update_status_message(PIECE_DETECTED_MESSAGE, false, false);
    }

    fn clear_piece(&mut self) {
        self.piece_in_progress = false;
        self.waiting_for_sensor2 = false;
        self.sensor2_wait_start = None;
    }

    /// Spawn the processing task unless one is already in flight.
    fn try_spawn(&mut self, now: Instant) -> bool {
        if self.in_flight.is_some() {
            tracing::warn!("Processing already active; trigger ignored");
            return false;
        }

        self.solenoid_locked = true;
        self.wait_warning_shown = false;

        let (tx, rx) = oneshot::channel();
        let processor = Arc::clone(&self.processor);
        let handle = tokio::spawn(async move {
            let outcome = processor.process().await;
            // Receiver is gone only after shutdown gave up on us.
            let _ = tx.send(outcome);
        });

        self.in_flight = Some(InFlight {
            handle,
            result: rx,
            started: now,
        });
        tracing::debug!("Processing task spawned");
        true
    }

    fn poll_processing(&mut self, now: Instant) -> Result<(), TickError> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Ok(());
        };

        match in_flight.result.try_recv() {
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Closed) => {
                let started = in_flight.started;
                self.in_flight = None;
                self.state = InspectionState::Normal;
                self.unlock();
                tracing::error!(
                    running_ms = now.saturating_duration_since(started).as_millis() as u64,
                    "Processing task ended without a result"
                );
                Err(TickError::TaskLost)
            }
            Ok(outcome) => {
                self.in_flight = None;
                self.apply_outcome(outcome, now)
            }
        }
    }

    fn apply_outcome(&mut self, outcome: ProcessingOutcome, now: Instant) -> Result<(), TickError> {
        self.alert = None;
        self.state = InspectionState::Normal;
        self.record_outcome(&outcome);

        match &outcome {
            ProcessingOutcome::Passed { .. } => {
                self.display.update_status_message(PASSED_MESSAGE, false, false);
            }
            ProcessingOutcome::Rejected { reason, .. } => {
                tracing::info!(%reason, "Ejecting piece");
                self.raise_alert(EJECTING_MESSAGE);
            }
            ProcessingOutcome::InferenceFailed { error, eject, .. } => {
                let message = if *eject {
                    format!("Inference failed, ejecting piece: {}", error)
                } else {
                    format!("Inference failed: {}", error)
                };
                self.raise_alert(&message);
            }
            ProcessingOutcome::CaptureFailed { error, .. } => {
                self.raise_alert(&format!("Processing error: {}", error));
            }
        }
        self.display.update_metrics(&self.metrics.snapshot());

        if outcome.ejects() {
            self.ejection = EjectionCycle::Ejecting { start: now };
            self.hardware.set_ejector(true)?;
        } else {
            self.unlock();
        }
        Ok(())
    }

    fn record_outcome(&mut self, outcome: &ProcessingOutcome) {
        let elapsed = outcome.elapsed();
        match outcome {
            ProcessingOutcome::Passed { predictions, .. } => {
                self.metrics.record_analyzed(PieceOutcome::Passed, elapsed);
                if let Some(predictions) = predictions {
                    self.last_predictions = Some(predictions.clone());
                }
            }
            ProcessingOutcome::Rejected { predictions, .. } => {
                self.metrics.record_analyzed(PieceOutcome::Ejected, elapsed);
                self.last_predictions = Some(predictions.clone());
            }
            ProcessingOutcome::InferenceFailed { error, .. }
            | ProcessingOutcome::CaptureFailed { error, .. } => {
                self.metrics.record_processing_error(error, elapsed);
            }
        }
    }

    fn network_tick(&mut self, now: Instant) {
        let Some(monitor) = self.network.clone() else {
            return;
        };

        if let Some(probe) = self.network_probe.as_mut() {
            if !probe.is_finished() {
                return;
            }
            let finished = probe.now_or_never();
            self.network_probe = None;
            match finished {
                Some(Ok(report)) => self.apply_network_report(&report),
                Some(Err(e)) => tracing::warn!(error = %e, "Network probe task failed"),
                None => {}
            }
        }

        let due = self
            .last_network_check
            .is_none_or(|last| now.saturating_duration_since(last) >= self.network_interval);
        if !due {
            return;
        }

        self.last_network_check = Some(now);
        self.network_probe = Some(tokio::spawn(async move { monitor.check_all().await }));
    }

    fn apply_network_report(&mut self, report: &NetworkReport) {
        let issues = report.has_issues();
        if issues && !self.network_issue {
            self.display
                .update_status_message(CONNECTIVITY_ISSUE_MESSAGE, true, true);
        } else if !issues && self.network_issue {
            self.display
                .update_status_message("Network connectivity restored", false, true);
        }
        self.network_issue = issues;
    }

    fn raise_alert(&mut self, message: &str) {
        self.display.update_status_message(message, true, false);
        self.alert = Some(message.to_string());
    }

    fn unlock(&mut self) {
        self.solenoid_locked = false;
        self.wait_warning_shown = false;
    }
}

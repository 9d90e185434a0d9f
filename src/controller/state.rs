//! Controller state types.

use std::time::{Duration, Instant};

/// Which sub-transitions are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectionState {
    #[default]
    Normal,
    /// A released piece never reached the slot
    ErrorRecovery,
}

/// Pneumatic ejector cycle. Exactly one variant holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EjectionCycle {
    #[default]
    Idle,
    Ejecting { start: Instant },
    PostDelay { start: Instant },
}

/// Sensor 1 edge times driving the gate solenoid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolenoidTiming {
    pub activation_edge_time: Option<Instant>,
    pub deactivation_edge_time: Option<Instant>,
}

impl SolenoidTiming {
    /// Record edges of sensor 1.
    ///
    /// The hold-open window only starts if the solenoid was open when the
    /// sensor released; a pulse shorter than the start delay never opens it.
    pub fn record_edge(&mut self, previous: bool, current: bool, solenoid_on: bool, now: Instant) {
        match (previous, current) {
            (false, true) => self.activation_edge_time = Some(now),
            (true, false) => {
                self.deactivation_edge_time = if solenoid_on { Some(now) } else { None };
            }
            _ => {}
        }
    }

    /// Desired solenoid output for this tick.
    pub fn desired(
        &self,
        sensor1: bool,
        now: Instant,
        start_delay: Duration,
        hold_delay: Duration,
    ) -> bool {
        if sensor1 {
            self.activation_edge_time
                .is_some_and(|t| now.saturating_duration_since(t) >= start_delay)
        } else {
            self.deactivation_edge_time
                .is_some_and(|t| now.saturating_duration_since(t) < hold_delay)
        }
    }
}

/// What a tick did, for the driver and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ejector asserted; all other logic frozen
    Ejecting,
    /// Post-ejection settle; all other logic frozen
    Settling,
    /// Solenoid held closed while a piece is processed
    Locked,
    /// Normal polling; carries the solenoid output written this tick
    Polled { solenoid: bool },
}

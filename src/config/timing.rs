//! Controller timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted slot-arrival wait.
pub const MAX_SENSOR2_WAIT_SECONDS: f64 = 3600.0;

/// Tick rate, solenoid debounce and ejection cycle timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    /// Sensor 1 must be high this long before the solenoid opens
    pub start_delay_ms: u64,
    /// Solenoid stays open this long after sensor 1 releases
    pub hold_delay_ms: u64,
    pub ejection_time_ms: u64,
    pub post_ejection_delay_ms: u64,
    /// Time allowed for a released piece to reach the slot
    pub sensor2_wait_time_s: f64,
    /// Upper bound on waiting for an in-flight piece at shutdown
    pub shutdown_timeout_seconds: u64,
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn ejection_time(&self) -> Duration {
        Duration::from_millis(self.ejection_time_ms)
    }

    pub fn post_ejection_delay(&self) -> Duration {
        Duration::from_millis(self.post_ejection_delay_ms)
    }

    pub fn sensor2_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.sensor2_wait_time_s.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            start_delay_ms: 300,
            hold_delay_ms: 500,
            ejection_time_ms: 500,
            post_ejection_delay_ms: 1000,
            sensor2_wait_time_s: 0.5,
            shutdown_timeout_seconds: 2,
        }
    }
}

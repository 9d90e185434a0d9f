//! Per-service connection state and bounded history.

use super::ProbeError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;

/// The three monitored services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Internet,
    Camera,
    Inference,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Internet, ServiceKind::Camera, ServiceKind::Inference];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Internet => "internet",
            ServiceKind::Camera => "camera",
            ServiceKind::Inference => "inference",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ServiceKind::Internet => 0,
            ServiceKind::Camera => 1,
            ServiceKind::Inference => 2,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Unknown,
    #[serde(rename = "InvalidURL")]
    InvalidUrl,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Unknown => "Unknown",
            ConnectionState::InvalidUrl => "Invalid URL",
        };
        f.write_str(s)
    }
}

/// Result of one probe: round-trip time in milliseconds when measurable.
pub type ProbeResult = Result<Option<f64>, ProbeError>;

/// Latest known status of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: ConnectionState,
    pub last_check: Option<DateTime<Local>>,
    pub last_success: Option<DateTime<Local>>,
    /// Milliseconds
    pub ping_time: Option<f64>,
    /// Consecutive failures; reset on success
    pub error_count: u32,
    /// Probed host or resolver address
    pub ip: Option<String>,
    pub last_error: Option<String>,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            status: ConnectionState::Unknown,
            last_check: None,
            last_success: None,
            ping_time: None,
            error_count: 0,
            ip: None,
            last_error: None,
        }
    }
}

impl ServiceStatus {
    /// Fold a probe result into the status. Returns the previous state.
    pub fn apply(&mut self, result: &ProbeResult, now: DateTime<Local>) -> ConnectionState {
        let previous = self.status;
        self.last_check = Some(now);

        match result {
            Ok(ping_time) => {
                self.status = ConnectionState::Connected;
                self.last_success = Some(now);
                self.ping_time = *ping_time;
                self.error_count = 0;
                self.last_error = None;
            }
            Err(error) => {
                self.status = match error {
                    ProbeError::InvalidUrl(_) => ConnectionState::InvalidUrl,
                    _ => ConnectionState::Disconnected,
                };
                self.ping_time = None;
                self.error_count = self.error_count.saturating_add(1);
                self.last_error = Some(error.to_string());
            }
        }

        previous
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ConnectionState::Connected
    }
}

/// One timestamped history sample.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSample {
    pub timestamp: DateTime<Local>,
    pub status: ConnectionState,
    pub ping_time: Option<f64>,
    pub error_count: u32,
}

/// Aggregates over a service's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub samples: usize,
    pub uptime_percent: f64,
    pub average_ping_ms: Option<f64>,
    /// Mean consecutive-failure count across samples
    pub error_rate: f64,
}

/// Ring buffer of status samples, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ServiceHistory {
    samples: VecDeque<StatusSample>,
    capacity: usize,
}

impl ServiceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, status: &ServiceStatus, timestamp: DateTime<Local>) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(StatusSample {
            timestamp,
            status: status.status,
            ping_time: status.ping_time,
            error_count: status.error_count,
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in chronological order (oldest first).
    pub fn samples(&self) -> impl Iterator<Item = &StatusSample> {
        self.samples.iter()
    }

    pub fn stats(&self) -> ConnectionStats {
        if self.samples.is_empty() {
            return ConnectionStats::default();
        }

        let total = self.samples.len() as f64;
        let connected = self
            .samples
            .iter()
            .filter(|s| s.status == ConnectionState::Connected)
            .count() as f64;
        let errors: u64 = self.samples.iter().map(|s| s.error_count as u64).sum();

        let pings: Vec<f64> = self.samples.iter().filter_map(|s| s.ping_time).collect();
        let average_ping_ms = if pings.is_empty() {
            None
        } else {
            Some(pings.iter().sum::<f64>() / pings.len() as f64)
        };

        ConnectionStats {
            samples: self.samples.len(),
            uptime_percent: connected / total * 100.0,
            average_ping_ms,
            error_rate: errors as f64 / total,
        }
    }
}

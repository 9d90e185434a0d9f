//! Network health monitoring for the internet uplink, the camera and the
//! inference server.
//!
//! Status is informational: it feeds the display and the `network` command
//! but never gates control decisions. Probe failures only update status
//! fields; nothing here returns an error to the caller.

mod error;
mod probe;
mod state;

#[cfg(test)]
mod tests;

pub use error::ProbeError;
pub use probe::{parse_ping_time, Prober, SystemProber};
pub use state::{
    ConnectionState, ConnectionStats, ProbeResult, ServiceHistory, ServiceKind, ServiceStatus,
    StatusSample,
};

use crate::config::{InspectorConfig, NetworkConfig};
use chrono::Local;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Status message emitted when any service is down.
pub const CONNECTIVITY_ISSUE_MESSAGE: &str = "Network connectivity issues detected";

/// Status and history of one service at report time.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub service: ServiceKind,
    pub status: ServiceStatus,
    pub stats: ConnectionStats,
}

/// Result of one `check_all` cycle.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub services: Vec<ServiceReport>,
}

impl NetworkReport {
    /// Whether any service is not connected.
    pub fn has_issues(&self) -> bool {
        self.services.iter().any(|s| !s.status.is_healthy())
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.service == kind)
    }
}

struct MonitorState {
    statuses: [ServiceStatus; 3],
    histories: [ServiceHistory; 3],
}

/// Probes the three services and keeps bounded history for each.
pub struct NetworkMonitor {
    config: NetworkConfig,
    camera_url: String,
    inference_url: String,
    prober: Arc<dyn Prober>,
    state: Mutex<MonitorState>,
}

impl NetworkMonitor {
    /// Create a monitor using the system network stack.
    pub fn new(config: &InspectorConfig) -> Self {
        Self::with_prober(config, Arc::new(SystemProber))
    }

    /// Create a monitor with a custom prober (for testing).
    pub fn with_prober(config: &InspectorConfig, prober: Arc<dyn Prober>) -> Self {
        let history_size = config.network.history_size;
        let mut statuses: [ServiceStatus; 3] = Default::default();
        statuses[ServiceKind::Camera.index()].ip = extract_host(&config.endpoints.image_url);
        statuses[ServiceKind::Inference.index()].ip = extract_host(&config.endpoints.inference_url);

        Self {
            config: config.network.clone(),
            camera_url: config.endpoints.image_url.clone(),
            inference_url: config.endpoints.inference_url.clone(),
            prober,
            state: Mutex::new(MonitorState {
                statuses,
                histories: [
                    ServiceHistory::new(history_size),
                    ServiceHistory::new(history_size),
                    ServiceHistory::new(history_size),
                ],
            }),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Probe every service once and return the resulting report.
    pub async fn check_all(&self) -> NetworkReport {
        tokio::join!(
            self.check(ServiceKind::Internet),
            self.check(ServiceKind::Camera),
            self.check(ServiceKind::Inference),
        );
        self.report()
    }

    /// Probe one service and record the outcome. Returns `true` if reachable.
    pub async fn check(&self, kind: ServiceKind) -> bool {
        let start = Instant::now();
        let (ip, result) = match kind {
            ServiceKind::Internet => self.probe_internet().await,
            ServiceKind::Camera => self.probe_host(&self.camera_url).await,
            ServiceKind::Inference => self.probe_host(&self.inference_url).await,
        };

        metrics::histogram!("inspector_probe_duration_seconds", "service" => kind.as_str())
            .record(start.elapsed().as_secs_f64());

        self.record(kind, ip, &result);
        result.is_ok()
    }

    /// Current status of one service.
    pub fn status(&self, kind: ServiceKind) -> ServiceStatus {
        self.lock().statuses[kind.index()].clone()
    }

    /// Uptime, average ping and error rate over the retained history.
    pub fn connection_stats(&self, kind: ServiceKind) -> ConnectionStats {
        self.lock().histories[kind.index()].stats()
    }

    /// Number of history samples retained for one service.
    pub fn history_len(&self, kind: ServiceKind) -> usize {
        self.lock().histories[kind.index()].len()
    }

    pub fn report(&self) -> NetworkReport {
        let state = self.lock();
        NetworkReport {
            services: ServiceKind::ALL
                .iter()
                .map(|kind| ServiceReport {
                    service: *kind,
                    status: state.statuses[kind.index()].clone(),
                    stats: state.histories[kind.index()].stats(),
                })
                .collect(),
        }
    }

    /// TCP connect to each resolver in order; the first success wins.
    async fn probe_internet(&self) -> (Option<String>, ProbeResult) {
        let timeout = self.config.connect_timeout();
        let mut last_error = ProbeError::ConnectionFailed("no DNS servers configured".to_string());

        for server in &self.config.dns_servers {
            match self.prober.connect(server, self.config.dns_port, timeout).await {
                Ok(elapsed_ms) => return (Some(server.clone()), Ok(Some(elapsed_ms))),
                Err(e) => {
                    tracing::debug!(server = %server, error = %e, "DNS resolver unreachable");
                    last_error = e;
                }
            }
        }

        (None, Err(last_error))
    }

    async fn probe_host(&self, url: &str) -> (Option<String>, ProbeResult) {
        let Some(host) = extract_host(url) else {
            return (None, Err(ProbeError::InvalidUrl(url.to_string())));
        };
        let result = self.prober.ping(&host, self.config.ping_timeout()).await;
        (Some(host), result)
    }

    fn record(&self, kind: ServiceKind, ip: Option<String>, result: &ProbeResult) {
        let now = Local::now();
        let mut state = self.lock();
        let index = kind.index();

        let status = &mut state.statuses[index];
        if ip.is_some() {
            status.ip = ip;
        }
        let previous = status.apply(result, now);
        let current = status.clone();

        if previous != current.status {
            tracing::info!(
                target: "inspector::network",
                service = %kind,
                old_status = %previous,
                new_status = %current.status,
                "Service status changed"
            );
        }
        if let Err(error) = result {
            tracing::debug!(
                target: "inspector::network",
                service = %kind,
                error = %error,
                error_count = current.error_count,
                "Probe failed"
            );
        }

        state.histories[index].push(&current, now);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Host part of a URL, if it parses and has one.
pub fn extract_host(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

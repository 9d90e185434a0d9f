//! Unit tests for network module.

use super::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// Prober whose reachable hosts are set by the test.
#[derive(Default)]
struct FakeProber {
    reachable: Mutex<HashSet<String>>,
    connects: Mutex<Vec<String>>,
}

impl FakeProber {
    fn with_reachable(hosts: &[&str]) -> Arc<Self> {
        let prober = Self::default();
        for host in hosts {
            prober.set_reachable(host, true);
        }
        Arc::new(prober)
    }

    fn set_reachable(&self, host: &str, up: bool) {
        let mut reachable = self.reachable.lock().unwrap();
        if up {
            reachable.insert(host.to_string());
        } else {
            reachable.remove(host);
        }
    }

    fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn connect(&self, host: &str, _port: u16, _timeout: Duration) -> Result<f64, ProbeError> {
        self.connects.lock().unwrap().push(host.to_string());
        if self.reachable.lock().unwrap().contains(host) {
            Ok(4.0)
        } else {
            Err(ProbeError::ConnectionFailed(format!("{} refused", host)))
        }
    }

    async fn ping(&self, host: &str, _timeout: Duration) -> Result<Option<f64>, ProbeError> {
        if self.reachable.lock().unwrap().contains(host) {
            Ok(Some(2.0))
        } else {
            Err(ProbeError::PingFailed(format!("{} did not reply", host)))
        }
    }
}

fn config() -> InspectorConfig {
    let mut config = InspectorConfig::default();
    config.endpoints.image_url = "http://camera.local:1821".to_string();
    config.endpoints.inference_url = "http://ai.local:5000/detect-imperfection".to_string();
    config
}

// ============================================================================
// ServiceStatus
// ============================================================================

#[test]
fn test_status_starts_unknown() {
    let status = ServiceStatus::default();
    assert_eq!(status.status, ConnectionState::Unknown);
    assert_eq!(status.error_count, 0);
    assert!(status.last_check.is_none());
}

#[test]
fn test_status_success_resets_error_count() {
    let mut status = ServiceStatus::default();
    let now = Local::now();

    status.apply(&Err(ProbeError::Timeout(1)), now);
    status.apply(&Err(ProbeError::Timeout(1)), now);
    assert_eq!(status.error_count, 2);
    assert_eq!(status.status, ConnectionState::Disconnected);
    assert!(status.last_success.is_none());

    let previous = status.apply(&Ok(Some(3.5)), now);
    assert_eq!(previous, ConnectionState::Disconnected);
    assert_eq!(status.status, ConnectionState::Connected);
    assert_eq!(status.error_count, 0);
    assert_eq!(status.ping_time, Some(3.5));
    assert_eq!(status.last_success, Some(now));
}

#[test]
fn test_status_error_count_saturates() {
    let mut status = ServiceStatus {
        error_count: u32::MAX,
        ..Default::default()
    };
    status.apply(&Err(ProbeError::Timeout(1)), Local::now());
    assert_eq!(status.error_count, u32::MAX);
}

#[test]
fn test_status_invalid_url() {
    let mut status = ServiceStatus::default();
    status.apply(&Err(ProbeError::InvalidUrl("::".to_string())), Local::now());
    assert_eq!(status.status, ConnectionState::InvalidUrl);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.status.to_string(), "Invalid URL");
}

// ============================================================================
// ServiceHistory
// ============================================================================

#[test]
fn test_history_evicts_oldest() {
    let mut history = ServiceHistory::new(3);
    let mut status = ServiceStatus::default();
    let now = Local::now();

    for ping in [1.0, 2.0, 3.0, 4.0, 5.0] {
        status.apply(&Ok(Some(ping)), now);
        history.push(&status, now);
    }

    assert_eq!(history.len(), 3);
    let pings: Vec<f64> = history.samples().filter_map(|s| s.ping_time).collect();
    assert_eq!(pings, vec![3.0, 4.0, 5.0]);
}

#[test]
fn test_history_stats() {
    let mut history = ServiceHistory::new(10);
    let mut status = ServiceStatus::default();
    let now = Local::now();

    status.apply(&Ok(Some(10.0)), now);
    history.push(&status, now);
    status.apply(&Err(ProbeError::Timeout(1)), now);
    history.push(&status, now);
    status.apply(&Err(ProbeError::Timeout(1)), now);
    history.push(&status, now);
    status.apply(&Ok(Some(20.0)), now);
    history.push(&status, now);

    let stats = history.stats();
    assert_eq!(stats.samples, 4);
    assert_eq!(stats.uptime_percent, 50.0);
    assert_eq!(stats.average_ping_ms, Some(15.0));
    // error counts 0, 1, 2, 0
    assert_eq!(stats.error_rate, 0.75);
}

#[test]
fn test_empty_history_stats() {
    let stats = ServiceHistory::new(5).stats();
    assert_eq!(stats.samples, 0);
    assert_eq!(stats.uptime_percent, 0.0);
    assert!(stats.average_ping_ms.is_none());
}

// ============================================================================
// NetworkMonitor
// ============================================================================

#[test]
fn test_extract_host() {
    assert_eq!(
        extract_host("http://192.168.1.164:1821").as_deref(),
        Some("192.168.1.164")
    );
    assert_eq!(extract_host("not a url"), None);
}

#[test]
fn test_monitor_prefills_service_hosts() {
    let monitor = NetworkMonitor::with_prober(&config(), FakeProber::with_reachable(&[]));
    assert_eq!(monitor.status(ServiceKind::Camera).ip.as_deref(), Some("camera.local"));
    assert_eq!(monitor.status(ServiceKind::Inference).ip.as_deref(), Some("ai.local"));
    assert_eq!(monitor.status(ServiceKind::Internet).status, ConnectionState::Unknown);
}

#[tokio::test]
async fn test_check_all_connected() {
    let prober = FakeProber::with_reachable(&["8.8.8.8", "camera.local", "ai.local"]);
    let monitor = NetworkMonitor::with_prober(&config(), prober);

    let report = monitor.check_all().await;

    assert!(!report.has_issues());
    for kind in ServiceKind::ALL {
        let service = report.get(kind).unwrap();
        assert_eq!(service.status.status, ConnectionState::Connected);
        assert_eq!(service.stats.samples, 1);
        assert_eq!(service.stats.uptime_percent, 100.0);
    }
}

#[tokio::test]
async fn test_internet_tries_resolvers_in_order() {
    let prober = FakeProber::with_reachable(&["1.1.1.1"]);
    let monitor = NetworkMonitor::with_prober(&config(), prober.clone());

    assert!(monitor.check(ServiceKind::Internet).await);
    assert_eq!(prober.connects(), vec!["8.8.8.8", "1.1.1.1"]);
    assert_eq!(monitor.status(ServiceKind::Internet).ip.as_deref(), Some("1.1.1.1"));
}

#[tokio::test]
async fn test_internet_all_resolvers_down() {
    let prober = FakeProber::with_reachable(&[]);
    let monitor = NetworkMonitor::with_prober(&config(), prober.clone());

    assert!(!monitor.check(ServiceKind::Internet).await);
    assert_eq!(prober.connects().len(), 3);

    let status = monitor.status(ServiceKind::Internet);
    assert_eq!(status.status, ConnectionState::Disconnected);
    assert!(status.last_error.unwrap().contains("8.8.4.4"));
}

#[tokio::test]
async fn test_camera_down_is_reported() {
    let prober = FakeProber::with_reachable(&["8.8.8.8", "ai.local"]);
    let monitor = NetworkMonitor::with_prober(&config(), prober.clone());

    let report = monitor.check_all().await;
    assert!(report.has_issues());
    assert_eq!(
        report.get(ServiceKind::Camera).unwrap().status.error_count,
        1
    );

    prober.set_reachable("camera.local", true);
    let report = monitor.check_all().await;
    assert!(!report.has_issues());

    let stats = monitor.connection_stats(ServiceKind::Camera);
    assert_eq!(stats.samples, 2);
    assert_eq!(stats.uptime_percent, 50.0);
}

#[tokio::test]
async fn test_invalid_url_is_recorded_in_history() {
    let mut config = config();
    config.endpoints.image_url = "camera without scheme".to_string();
    let monitor = NetworkMonitor::with_prober(&config, FakeProber::with_reachable(&[]));

    assert!(!monitor.check(ServiceKind::Camera).await);
    assert_eq!(
        monitor.status(ServiceKind::Camera).status,
        ConnectionState::InvalidUrl
    );
    assert_eq!(monitor.history_len(ServiceKind::Camera), 1);
}

#[tokio::test]
async fn test_history_is_bounded_by_config() {
    let mut config = config();
    config.network.history_size = 4;
    let monitor =
        NetworkMonitor::with_prober(&config, FakeProber::with_reachable(&["camera.local"]));

    for _ in 0..10 {
        monitor.check(ServiceKind::Camera).await;
    }
    assert_eq!(monitor.history_len(ServiceKind::Camera), 4);
}

#[test]
fn test_report_serializes_service_names() {
    let monitor = NetworkMonitor::with_prober(&config(), FakeProber::with_reachable(&[]));
    let json = serde_json::to_value(monitor.report()).unwrap();
    assert_eq!(json["services"][0]["service"], "internet");
    assert_eq!(json["services"][2]["service"], "inference");
    assert_eq!(json["services"][1]["status"]["status"], "Unknown");
}

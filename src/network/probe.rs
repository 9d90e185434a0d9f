//! Reachability probes.

use super::ProbeError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;

/// Low-level reachability checks used by the monitor.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Open (and drop) a TCP connection. Returns the connect time in ms.
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<f64, ProbeError>;

    /// Send one echo request. Returns the round-trip time in ms when the
    /// reply reports one.
    async fn ping(&self, host: &str, timeout: Duration) -> Result<Option<f64>, ProbeError>;
}

/// Probes using the OS network stack and the system `ping` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProber;

#[async_trait]
impl Prober for SystemProber {
    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<f64, ProbeError> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Ok(start.elapsed().as_secs_f64() * 1000.0),
            Ok(Err(e)) => Err(ProbeError::ConnectionFailed(format!("{}:{}: {}", host, port, e))),
            Err(_) => Err(ProbeError::Timeout(timeout.as_secs())),
        }
    }

    async fn ping(&self, host: &str, timeout: Duration) -> Result<Option<f64>, ProbeError> {
        let deadline_secs = timeout.as_secs().max(1);
        let mut command = Command::new("ping");
        command
            .args(["-c", "1", "-W", &deadline_secs.to_string(), host])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Give the process a second beyond its own deadline to exit
        let guard = Duration::from_secs(deadline_secs + 1);
        let output = match tokio::time::timeout(guard, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ProbeError::PingFailed(format!("cannot run ping: {}", e))),
            Err(_) => return Err(ProbeError::Timeout(deadline_secs)),
        };

        if !output.status.success() {
            return Err(ProbeError::PingFailed(format!("{} did not reply", host)));
        }

        Ok(parse_ping_time(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extract the round-trip time from `ping` output (`time=12.3 ms`).
pub fn parse_ping_time(stdout: &str) -> Option<f64> {
    let rest = stdout.split("time=").nth(1)?;
    let token = rest.split_whitespace().next()?;
    token.trim_end_matches("ms").parse().ok()
}

//! Error types for network probes.

use thiserror::Error;

/// Errors that can occur while probing a service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    /// Probe exceeded its deadline
    #[error("probe timeout after {0}s")]
    Timeout(u64),

    /// TCP connect refused or unreachable
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Echo request got no reply, or the ping command could not run
    #[error("ping failed: {0}")]
    PingFailed(String),

    /// Configured URL has no usable host
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

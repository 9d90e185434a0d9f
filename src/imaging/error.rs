//! Error types for image capture and inference.

use std::time::Duration;
use thiserror::Error;

/// Errors that abort a single processing cycle.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Connection refused, DNS failure, reset mid-body.
    #[error("Network error: {0}")]
    Network(String),

    /// Connect or read deadline exceeded.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Camera or inference service answered with a non-success status.
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected content type: {0}")]
    ContentType(String),

    #[error("Image too small: {size} bytes (minimum {min})")]
    TooSmall { size: usize, min: usize },

    /// Bytes did not decode as an image, or decoded too small.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Inference response is not JSON or carries no predictions array.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PipelineError {
    /// Classify a transport error, reporting whichever deadline applied.
    pub(crate) fn from_reqwest(err: reqwest::Error, connect: Duration, read: Duration) -> Self {
        if err.is_timeout() {
            let deadline = if err.is_connect() { connect } else { read };
            PipelineError::Timeout(deadline.as_millis() as u64)
        } else {
            PipelineError::Network(err.to_string())
        }
    }
}

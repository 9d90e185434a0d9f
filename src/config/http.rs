//! Endpoint and HTTP transfer configuration

use serde::{Deserialize, Serialize};

/// Camera and inference service locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub image_url: String,
    pub inference_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            image_url: "http://192.168.1.164:1821".to_string(),
            inference_url: "http://192.168.1.210:5000/detect-imperfection".to_string(),
        }
    }
}

/// Timeouts and validation limits for image transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub camera_connect_timeout_seconds: u64,
    pub camera_read_timeout_seconds: u64,
    pub inference_connect_timeout_seconds: u64,
    pub inference_read_timeout_seconds: u64,
    /// Captures smaller than this are treated as corrupt
    pub min_image_bytes: usize,
    /// Decode each capture before accepting it
    pub verify_images: bool,
    /// Report download progress only for bodies larger than this
    pub progress_threshold_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            camera_connect_timeout_seconds: 5,
            camera_read_timeout_seconds: 30,
            inference_connect_timeout_seconds: 5,
            inference_read_timeout_seconds: 30,
            min_image_bytes: 100,
            verify_images: true,
            progress_threshold_bytes: 100_000,
        }
    }
}

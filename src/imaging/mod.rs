//! Image pipeline: capture from the camera, verify, and analyze.
//!
//! [`ImagePipeline::get_image`] downloads a capture with its own connect and
//! read deadlines, rejects anything that is not an image or is too small,
//! and optionally decodes it to check integrity. [`ImagePipeline::analyze`]
//! uploads the capture as multipart form data and turns the response into a
//! [`PredictionSet`].

pub mod error;
pub mod prediction;

pub use error::PipelineError;
pub use prediction::{
    parse_response, BoundingBox, Prediction, PredictionSet, PredictionSummary, Severity,
    SeverityCounts,
};

use crate::cache::ImageCache;
use crate::config::{HttpConfig, InspectorConfig};
use crate::display::Display;
use chrono::{DateTime, Local};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Response};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Smallest accepted decoded width and height, in pixels.
pub const MIN_IMAGE_DIMENSION: u32 = 10;

/// A verified capture.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    /// Decoded `(width, height)`; `None` when verification is disabled
    pub dimensions: Option<(u32, u32)>,
    pub from_cache: bool,
}

/// HTTP capture and inference client.
pub struct ImagePipeline {
    camera: Client,
    inference: Client,
    inference_url: String,
    http: HttpConfig,
    cache: Mutex<ImageCache>,
    reuse_captures: bool,
    display: Arc<dyn Display>,
}

impl ImagePipeline {
    pub fn new(config: &InspectorConfig, display: Arc<dyn Display>) -> Result<Self, PipelineError> {
        let http = config.http.clone();

        let camera = Client::builder()
            .connect_timeout(Duration::from_secs(http.camera_connect_timeout_seconds))
            .read_timeout(Duration::from_secs(http.camera_read_timeout_seconds))
            .build()
            .map_err(|e| PipelineError::Network(format!("Failed to build camera client: {}", e)))?;

        let inference = Client::builder()
            .connect_timeout(Duration::from_secs(http.inference_connect_timeout_seconds))
            .read_timeout(Duration::from_secs(http.inference_read_timeout_seconds))
            .build()
            .map_err(|e| {
                PipelineError::Network(format!("Failed to build inference client: {}", e))
            })?;

        Ok(Self {
            camera,
            inference,
            inference_url: config.endpoints.inference_url.clone(),
            http,
            cache: Mutex::new(ImageCache::from_config(&config.cache)),
            reuse_captures: config.cache.reuse_captures,
            display,
        })
    }

    /// Download and validate one capture from `url`.
    pub async fn get_image(&self, url: &str) -> Result<CapturedImage, PipelineError> {
        let key = capture_key(url, Local::now());

        if self.reuse_captures {
            let cached = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key);
            if let Some(bytes) = cached {
                tracing::debug!(key = %key, bytes = bytes.len(), "Serving capture from cache");
                self.display.update_status_message("Using cached image", false, false);
                let dimensions = self.verify(&bytes)?;
                return Ok(CapturedImage {
                    bytes,
                    dimensions,
                    from_cache: true,
                });
            }
        }

        let (connect, read) = self.camera_timeouts();
        let response = self
            .camera
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, connect, read))?;

        if !response.status().is_success() {
            return Err(PipelineError::Upstream {
                status: response.status().as_u16(),
                message: format!("Image request failed: {}", response.status()),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(PipelineError::ContentType(if content_type.is_empty() {
                "missing".to_string()
            } else {
                content_type
            }));
        }

        let bytes = self.read_body(response).await?;
        if bytes.len() < self.http.min_image_bytes {
            return Err(PipelineError::TooSmall {
                size: bytes.len(),
                min: self.http.min_image_bytes,
            });
        }

        let dimensions = self.verify(&bytes)?;
        tracing::debug!(url, bytes = bytes.len(), ?dimensions, "Capture downloaded");

        let stored = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(&key, bytes.clone());
        if !stored {
            tracing::debug!(key = %key, "Capture not cached");
        }

        Ok(CapturedImage {
            bytes,
            dimensions,
            from_cache: false,
        })
    }

    /// Upload a capture for inference and parse the predictions.
    pub async fn analyze(&self, image: &CapturedImage) -> Result<PredictionSet, PipelineError> {
        self.display
            .update_status_message("Sending image to AI server...", false, true);

        let part = Part::bytes(image.bytes.clone())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
        let form = Form::new().part("image", part);

        let connect = Duration::from_secs(self.http.inference_connect_timeout_seconds);
        let read = Duration::from_secs(self.http.inference_read_timeout_seconds);
        let response = self
            .inference
            .post(&self.inference_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, connect, read))?;

        if !response.status().is_success() {
            return Err(PipelineError::Upstream {
                status: response.status().as_u16(),
                message: format!("Inference request failed: {}", response.status()),
            });
        }

        let body = response.text().await.map_err(|e| {
            PipelineError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            PipelineError::InvalidResponse(format!("Failed to parse inference response: {}", e))
        })?;

        parse_response(&value, image.dimensions)
    }

    /// Number of captures currently held in the cache.
    pub fn cached_captures(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn camera_timeouts(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.http.camera_connect_timeout_seconds),
            Duration::from_secs(self.http.camera_read_timeout_seconds),
        )
    }

    fn verify(&self, bytes: &[u8]) -> Result<Option<(u32, u32)>, PipelineError> {
        if self.http.verify_images {
            verify_image(bytes).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Stream the body, reporting progress every 5% for large known-length
    /// downloads.
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, PipelineError> {
        let (connect, read) = self.camera_timeouts();
        let total = response
            .content_length()
            .filter(|len| *len > self.http.progress_threshold_bytes);

        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        let mut last_step = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::from_reqwest(e, connect, read))?;
            body.extend_from_slice(&chunk);

            if let Some(total) = total {
                let step = (body.len() as u64 * 20) / total;
                if step > last_step {
                    last_step = step;
                    self.display.update_status_message(
                        &format!(
                            "Downloading: {}% ({:.1} KB)",
                            (step * 5).min(100),
                            body.len() as f64 / 1024.0
                        ),
                        false,
                        true,
                    );
                }
            }
        }

        Ok(body)
    }
}

/// Cache key for a capture: the URL plus the wall-clock minute.
pub fn capture_key(url: &str, at: DateTime<Local>) -> String {
    format!("{}:{}", url, at.format("%Y%m%d%H%M"))
}

/// Decode `bytes` and return its dimensions.
pub fn verify_image(bytes: &[u8]) -> Result<(u32, u32), PipelineError> {
    use image::GenericImageView;

    let decoded =
        image::load_from_memory(bytes).map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(PipelineError::InvalidImage(format!(
            "dimensions too small: {}x{}",
            width, height
        )));
    }
    Ok((width, height))
}

//! Shared test utilities for inspection line integration tests.
//!
//! Builds a complete line (simulated hardware, real HTTP pipeline, recording
//! display) pointed at a mock camera and inference server.

#![allow(dead_code)]

use inspector::config::InspectorConfig;
use inspector::controller::{Controller, InspectionPipeline};
use inspector::display::RecordingDisplay;
use inspector::hardware::SimulatedPort;
use inspector::imaging::ImagePipeline;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Fixtures
// =============================================================================

pub const CAPTURE_PATH: &str = "/capture";
pub const DETECT_PATH: &str = "/detect-imperfection";

/// Encode a solid-color JPEG of the given size.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 90, 90]));
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .encode_image(&img)
        .unwrap();
    buf
}

/// Inference response with one large, confident defect.
pub fn defect_response() -> Value {
    json!({
        "predictions": [
            {"class": "scratch", "confidence": 0.9, "bbox": [0.1, 0.1, 0.5, 0.5]}
        ]
    })
}

pub fn clean_response() -> Value {
    json!({ "predictions": [] })
}

// =============================================================================
// Line Builders
// =============================================================================

/// Defaults with both endpoints on `server_uri`.
pub fn config_for(server_uri: &str) -> InspectorConfig {
    let mut config = InspectorConfig::default();
    config.endpoints.image_url = format!("{}{}", server_uri, CAPTURE_PATH);
    config.endpoints.inference_url = format!("{}{}", server_uri, DETECT_PATH);
    config.http.camera_read_timeout_seconds = 5;
    config.http.inference_read_timeout_seconds = 5;
    config.network.enabled = false;
    config
}

pub struct Line {
    pub port: SimulatedPort,
    pub display: Arc<RecordingDisplay>,
    pub controller: Controller,
    pub t0: Instant,
}

impl Line {
    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    pub fn tick(&mut self, ms: u64) {
        let now = self.at(ms);
        self.controller.tick_at(now).unwrap();
    }

    /// Piece clears sensor 1 at 100 ms and sits in the slot; processing
    /// starts on the 600 ms tick.
    pub fn feed_piece(&mut self) {
        self.port.set_sensor2(true);
        self.port.set_sensor1(true);
        self.tick(0);
        self.port.set_sensor1(false);
        self.tick(100);
        self.tick(600);
        assert!(self.controller.processing_active(), "processing did not start");
    }

    /// Keep ticking at `ms` until the processing outcome has been applied.
    pub async fn finish_processing(&mut self, ms: u64) {
        for _ in 0..500 {
            self.tick(ms);
            if !self.controller.processing_active() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("processing did not finish");
    }
}

pub fn build_line(config: &InspectorConfig) -> Line {
    let port = SimulatedPort::new();
    let display = Arc::new(RecordingDisplay::new());
    let pipeline = ImagePipeline::new(config, display.clone()).unwrap();
    let processor = InspectionPipeline::new(
        pipeline,
        config.endpoints.image_url.clone(),
        config.ejection.clone(),
        display.clone(),
    );
    let controller = Controller::new(
        Box::new(port.clone()),
        Arc::new(processor),
        display.clone(),
        config.timing.clone(),
    );

    Line {
        port,
        display,
        controller,
        t0: Instant::now(),
    }
}

//! Background processing of one piece: capture, inference, decision.

use crate::config::EjectionThresholds;
use crate::display::Display;
use crate::imaging::{ImagePipeline, PredictionSet};
use crate::policy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result reported back to the controller through the task's result channel.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    Passed {
        predictions: Option<PredictionSet>,
        elapsed: Duration,
    },
    Rejected {
        predictions: PredictionSet,
        reason: String,
        elapsed: Duration,
    },
    /// Capture succeeded but inference failed or returned no predictions.
    InferenceFailed {
        error: String,
        /// Fail-safe ejection applies
        eject: bool,
        elapsed: Duration,
    },
    /// No usable image; the piece is released without a decision.
    CaptureFailed { error: String, elapsed: Duration },
}

impl ProcessingOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            ProcessingOutcome::Passed { elapsed, .. }
            | ProcessingOutcome::Rejected { elapsed, .. }
            | ProcessingOutcome::InferenceFailed { elapsed, .. }
            | ProcessingOutcome::CaptureFailed { elapsed, .. } => *elapsed,
        }
    }

    /// Whether the ejection cycle must run.
    pub fn ejects(&self) -> bool {
        match self {
            ProcessingOutcome::Rejected { .. } => true,
            ProcessingOutcome::InferenceFailed { eject, .. } => *eject,
            _ => false,
        }
    }
}

/// Work run off the tick loop for each piece that reaches the slot.
#[async_trait]
pub trait PieceProcessor: Send + Sync {
    async fn process(&self) -> ProcessingOutcome;
}

/// Production processor: camera capture, inference upload, ejection policy.
pub struct InspectionPipeline {
    pipeline: ImagePipeline,
    image_url: String,
    thresholds: EjectionThresholds,
    display: Arc<dyn Display>,
    log_predictions: bool,
}

impl InspectionPipeline {
    pub fn new(
        pipeline: ImagePipeline,
        image_url: String,
        thresholds: EjectionThresholds,
        display: Arc<dyn Display>,
    ) -> Self {
        Self {
            pipeline,
            image_url,
            thresholds,
            display,
            log_predictions: false,
        }
    }

    /// Log every parsed prediction at info level.
    pub fn with_prediction_logging(mut self, enabled: bool) -> Self {
        self.log_predictions = enabled;
        self
    }
}

#[async_trait]
impl PieceProcessor for InspectionPipeline {
    async fn process(&self) -> ProcessingOutcome {
        let start = Instant::now();

        let image = match self.pipeline.get_image(&self.image_url).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(url = %self.image_url, error = %e, "Image capture failed");
                return ProcessingOutcome::CaptureFailed {
                    error: e.to_string(),
                    elapsed: start.elapsed(),
                };
            }
        };
        self.display.update_image(&image.bytes);

        let predictions = match self.pipeline.analyze(&image).await {
            Ok(predictions) => predictions,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    fail_safe = self.thresholds.fail_safe_eject,
                    "Inference failed"
                );
                return ProcessingOutcome::InferenceFailed {
                    error: e.to_string(),
                    eject: self.thresholds.fail_safe_eject,
                    elapsed: start.elapsed(),
                };
            }
        };
        self.display.update_predictions(&predictions);

        if self.log_predictions {
            for (i, p) in predictions.predictions().iter().enumerate() {
                tracing::info!(
                    index = i + 1,
                    class = %p.class_name,
                    confidence = p.confidence,
                    area = p.area,
                    severity = %p.severity,
                    "Prediction"
                );
            }
        }

        let elapsed = start.elapsed();
        match policy::evaluate(&predictions, &self.thresholds) {
            Some(reason) => {
                tracing::info!(%reason, count = predictions.len(), "Decision: eject");
                ProcessingOutcome::Rejected {
                    predictions,
                    reason: reason.to_string(),
                    elapsed,
                }
            }
            None => {
                tracing::info!(count = predictions.len(), "Decision: pass");
                ProcessingOutcome::Passed {
                    predictions: Some(predictions),
                    elapsed,
                }
            }
        }
    }
}

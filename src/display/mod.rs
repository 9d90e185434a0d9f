//! Display collaborator.
//!
//! The controller and the processing task report progress through the
//! [`Display`] trait. Calls are fire-and-forget: implementations must not
//! block and nothing they return is consumed.

use crate::imaging::PredictionSet;
use crate::metrics::MetricsSnapshot;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Messages retained by [`TracingDisplay`] for status rendering.
pub const MAX_LOG_MESSAGES: usize = 15;

/// One status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_alert: bool,
    pub is_network: bool,
}

/// Renderer contract.
pub trait Display: Send + Sync {
    fn update_status_message(&self, text: &str, is_alert: bool, is_network: bool);

    fn update_image(&self, bytes: &[u8]);

    fn update_predictions(&self, predictions: &PredictionSet);

    fn update_metrics(&self, metrics: &MetricsSnapshot);
}

/// Default renderer: every update becomes a log event.
///
/// Alerts are logged at `warn`, network messages under the
/// `inspector::network` target. The most recent messages are kept for
/// status queries.
#[derive(Debug, Default)]
pub struct TracingDisplay {
    recent: Mutex<VecDeque<StatusMessage>>,
}

impl TracingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent status messages, oldest first.
    pub fn recent_messages(&self) -> Vec<StatusMessage> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Display for TracingDisplay {
    fn update_status_message(&self, text: &str, is_alert: bool, is_network: bool) {
        match (is_alert, is_network) {
            (true, true) => tracing::warn!(target: "inspector::network", "{}", text),
            (false, true) => tracing::info!(target: "inspector::network", "{}", text),
            (true, false) => tracing::warn!("{}", text),
            (false, false) => tracing::info!("{}", text),
        }

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.len() >= MAX_LOG_MESSAGES {
            recent.pop_front();
        }
        recent.push_back(StatusMessage {
            text: text.to_string(),
            is_alert,
            is_network,
        });
    }

    fn update_image(&self, bytes: &[u8]) {
        tracing::debug!(bytes = bytes.len(), "Camera image updated");
    }

    fn update_predictions(&self, predictions: &PredictionSet) {
        let summary = predictions.summary();
        match &summary.best {
            Some(best) => tracing::info!(
                count = summary.count,
                critical = summary.severity_counts.critical,
                major = summary.severity_counts.major,
                "Detected {} defects - Best: {} ({:.1}%)",
                summary.count,
                best.class_name,
                best.confidence * 100.0
            ),
            None => tracing::info!("No defects found"),
        }
    }

    fn update_metrics(&self, metrics: &MetricsSnapshot) {
        tracing::debug!(
            processed = metrics.processed_count,
            passed = metrics.passed_count,
            ejected = metrics.ejected_count,
            errors = metrics.error_count,
            total_errors = metrics.total_errors,
            "Metrics updated"
        );
    }
}

/// Renderer that records every call, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    messages: Mutex<Vec<StatusMessage>>,
    images: Mutex<Vec<usize>>,
    predictions: Mutex<Vec<PredictionSet>>,
    metrics: Mutex<Option<MetricsSnapshot>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts of every alert message, in order.
    pub fn alerts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.is_alert)
            .map(|m| m.text)
            .collect()
    }

    /// Number of messages whose text contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages()
            .iter()
            .filter(|m| m.text.contains(needle))
            .count()
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    /// Byte length of every image shown.
    pub fn images(&self) -> Vec<usize> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn predictions(&self) -> Vec<PredictionSet> {
        self.predictions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Display for RecordingDisplay {
    fn update_status_message(&self, text: &str, is_alert: bool, is_network: bool) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StatusMessage {
                text: text.to_string(),
                is_alert,
                is_network,
            });
    }

    fn update_image(&self, bytes: &[u8]) {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bytes.len());
    }

    fn update_predictions(&self, predictions: &PredictionSet) {
        self.predictions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(predictions.clone());
    }

    fn update_metrics(&self, metrics: &MetricsSnapshot) {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = Some(metrics.clone());
    }
}

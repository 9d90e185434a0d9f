//! Structured inference results.
//!
//! The inference service answers with a loosely shaped JSON document. Each
//! entry of its `predictions` array is parsed on its own into a [`Prediction`]
//! with a normalized `[0,1]` bounding box; entries that cannot be parsed are
//! skipped with a warning instead of failing the whole response.
//!
//! Two box encodings are accepted:
//!
//! - `bbox: [x1, y1, x2, y2]` corner form
//! - `x, y, width, height` center form
//!
//! Either may be given in pixels. Any coordinate above 1.0 marks the box as
//! pixel space; it is then normalized by the `image: {width, height}` object of
//! the response or, failing that, by the dimensions of the decoded capture.

use super::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse defect category derived from confidence and area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Negligible,
}

impl Severity {
    /// Fixed lookup matrix over confidence and area bins.
    ///
    /// | confidence \ area | large (>= 0.05) | medium (>= 0.01) | small    |
    /// |-------------------|-----------------|------------------|----------|
    /// | high (>= 0.8)     | critical        | major            | minor    |
    /// | mid (>= 0.5)      | major           | minor            | minor    |
    /// | low               | minor           | negligible       | negligible |
    pub fn classify(confidence: f64, area: f64) -> Self {
        let confidence_bin = if confidence >= 0.8 {
            0
        } else if confidence >= 0.5 {
            1
        } else {
            2
        };
        let area_bin = if area >= 0.05 {
            0
        } else if area >= 0.01 {
            1
        } else {
            2
        };

        const MATRIX: [[Severity; 3]; 3] = [
            [Severity::Critical, Severity::Major, Severity::Minor],
            [Severity::Major, Severity::Minor, Severity::Minor],
            [Severity::Minor, Severity::Negligible, Severity::Negligible],
        ];
        MATRIX[confidence_bin][area_bin]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Negligible => "negligible",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized corner-form bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// One detected defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub area: f64,
    pub center: (f64, f64),
    pub severity: Severity,
}

impl Prediction {
    /// Build a prediction from an already normalized box.
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: BoundingBox) -> Self {
        let area = bbox.area();
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
            area,
            center: bbox.center(),
            severity: Severity::classify(confidence, area),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
    pub negligible: usize,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Major => self.major,
            Severity::Minor => self.minor,
            Severity::Negligible => self.negligible,
        }
    }

    fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Major => self.major += 1,
            Severity::Minor => self.minor += 1,
            Severity::Negligible => self.negligible += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.major + self.minor + self.negligible
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub count: usize,
    pub severity_counts: SeverityCounts,
    /// Highest-confidence prediction
    pub best: Option<Prediction>,
}

/// Predictions for one capture plus derived aggregates. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    predictions: Vec<Prediction>,
    summary: PredictionSummary,
}

impl PredictionSet {
    pub fn new(predictions: Vec<Prediction>) -> Self {
        let mut severity_counts = SeverityCounts::default();
        for prediction in &predictions {
            severity_counts.increment(prediction.severity);
        }
        let best = predictions
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .cloned();

        let summary = PredictionSummary {
            count: predictions.len(),
            severity_counts,
            best,
        };
        Self {
            predictions,
            summary,
        }
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn summary(&self) -> &PredictionSummary {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }
}

#[derive(Deserialize)]
struct ImageSize {
    width: f64,
    height: f64,
}

/// Wire shape of one prediction; every field optional so that a single bad
/// entry is reported precisely instead of failing deserialization of the batch.
#[derive(Deserialize)]
struct RawPrediction {
    confidence: Option<f64>,
    class: Option<String>,
    class_name: Option<String>,
    bbox: Option<Vec<f64>>,
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

/// Parse an inference response document.
///
/// A document without a `predictions` array is an error; the caller decides
/// whether that ejects. An empty array is a valid, defect-free result.
pub fn parse_response(
    body: &Value,
    image_size: Option<(u32, u32)>,
) -> Result<PredictionSet, PipelineError> {
    let entries = body
        .get("predictions")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::InvalidResponse("missing predictions array".to_string()))?;

    let dims = body
        .get("image")
        .and_then(|v| serde_json::from_value::<ImageSize>(v.clone()).ok())
        .filter(|size| size.width > 0.0 && size.height > 0.0)
        .map(|size| (size.width, size.height))
        .or_else(|| image_size.map(|(w, h)| (w as f64, h as f64)));

    let mut predictions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match parse_prediction(entry, dims) {
            Ok(prediction) => predictions.push(prediction),
            Err(EntryError::Malformed(reason)) => {
                tracing::warn!(index, %reason, "Skipping malformed prediction");
            }
            // Dropping it would let the piece pass with an unmeasured defect.
            Err(EntryError::UnknownScale) => {
                return Err(PipelineError::InvalidResponse(format!(
                    "prediction {} is in pixel space but the image size is unknown",
                    index + 1
                )));
            }
        }
    }

    Ok(PredictionSet::new(predictions))
}

/// Largest raw value still read as a normalized coordinate; absorbs float
/// overshoot at the image edge.
const NORMALIZED_LIMIT: f64 = 1.0 + 1e-3;

enum EntryError {
    Malformed(String),
    /// Pixel-space box with no image size to normalize against
    UnknownScale,
}

impl From<&str> for EntryError {
    fn from(reason: &str) -> Self {
        EntryError::Malformed(reason.to_string())
    }
}

impl From<String> for EntryError {
    fn from(reason: String) -> Self {
        EntryError::Malformed(reason)
    }
}

fn parse_prediction(entry: &Value, dims: Option<(f64, f64)>) -> Result<Prediction, EntryError> {
    let raw: RawPrediction =
        serde_json::from_value(entry.clone()).map_err(|e| format!("unreadable entry: {}", e))?;

    let confidence = raw.confidence.ok_or("missing confidence")?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {} outside [0, 1]", confidence).into());
    }

    let class_name = raw
        .class_name
        .or(raw.class)
        .unwrap_or_else(|| "defect".to_string());

    // Scale is decided on the values as sent, not on derived corners: a
    // normalized centre box at the edge has corners past 1.0.
    let (values, corners) = match (&raw.bbox, raw.x, raw.y, raw.width, raw.height) {
        (Some(bbox), _, _, _, _) => {
            if bbox.len() != 4 {
                return Err(format!("bbox has {} values, expected 4", bbox.len()).into());
            }
            let corners = [bbox[0], bbox[1], bbox[2], bbox[3]];
            (corners, corners)
        }
        (None, Some(x), Some(y), Some(w), Some(h)) => {
            if w < 0.0 || h < 0.0 {
                return Err("negative box size".into());
            }
            (
                [x, y, w, h],
                [x - w / 2.0, y - h / 2.0, x + w / 2.0, y + h / 2.0],
            )
        }
        _ => return Err("no bounding box".into()),
    };

    if values.iter().chain(corners.iter()).any(|v| !v.is_finite()) {
        return Err("non-finite coordinate".into());
    }

    let [mut x1, mut y1, mut x2, mut y2] = corners;
    if values.iter().any(|v| *v > NORMALIZED_LIMIT) {
        let (width, height) = dims.ok_or(EntryError::UnknownScale)?;
        x1 /= width;
        x2 /= width;
        y1 /= height;
        y2 /= height;
    }

    if x2 < x1 || y2 < y1 {
        return Err("inverted bounding box".into());
    }

    let bbox = BoundingBox {
        x1: x1.clamp(0.0, 1.0),
        y1: y1.clamp(0.0, 1.0),
        x2: x2.clamp(0.0, 1.0),
        y2: y2.clamp(0.0, 1.0),
    };

    Ok(Prediction::new(class_name, confidence, bbox))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_severity_matrix_corners() {
        assert_eq!(Severity::classify(0.9, 0.2), Severity::Critical);
        assert_eq!(Severity::classify(0.9, 0.02), Severity::Major);
        assert_eq!(Severity::classify(0.9, 0.001), Severity::Minor);
        assert_eq!(Severity::classify(0.6, 0.2), Severity::Major);
        assert_eq!(Severity::classify(0.6, 0.001), Severity::Minor);
        assert_eq!(Severity::classify(0.1, 0.2), Severity::Minor);
        assert_eq!(Severity::classify(0.1, 0.001), Severity::Negligible);
    }

    #[test]
    fn test_severity_bin_edges_are_inclusive() {
        assert_eq!(Severity::classify(0.8, 0.05), Severity::Critical);
        assert_eq!(Severity::classify(0.5, 0.01), Severity::Minor);
    }

    #[test]
    fn test_parse_corner_form() {
        let body = json!({
            "predictions": [{"confidence": 0.9, "bbox": [0.1, 0.1, 0.5, 0.5], "class": "scratch"}]
        });
        let set = parse_response(&body, None).unwrap();

        assert_eq!(set.len(), 1);
        let p = &set.predictions()[0];
        assert_eq!(p.class_name, "scratch");
        assert!(approx(p.area, 0.16));
        assert!(approx(p.center.0, 0.3));
        assert_eq!(p.severity, Severity::Critical);
        assert_eq!(set.summary().severity_counts.critical, 1);
    }

    #[test]
    fn test_parse_pixel_center_form_with_response_size() {
        let body = json!({
            "image": {"width": 1000, "height": 500},
            "predictions": [{"confidence": 0.7, "x": 500, "y": 250, "width": 100, "height": 50, "class_name": "dent"}]
        });
        let set = parse_response(&body, None).unwrap();

        let p = &set.predictions()[0];
        assert!(approx(p.bbox.x1, 0.45));
        assert!(approx(p.bbox.x2, 0.55));
        assert!(approx(p.bbox.y1, 0.45));
        assert!(approx(p.bbox.y2, 0.55));
        assert!(approx(p.area, 0.01));
        assert_eq!(p.class_name, "dent");
    }

    #[test]
    fn test_pixel_form_falls_back_to_capture_size() {
        let body = json!({
            "predictions": [{"confidence": 0.7, "bbox": [0, 0, 320, 240]}]
        });
        let set = parse_response(&body, Some((640, 480))).unwrap();

        let p = &set.predictions()[0];
        assert!(approx(p.bbox.x2, 0.5));
        assert!(approx(p.bbox.y2, 0.5));
        assert!(approx(p.area, 0.25));
    }

    #[test]
    fn test_pixel_form_without_any_size_fails_the_response() {
        let body = json!({
            "predictions": [
                {"confidence": 0.4, "bbox": [0.0, 0.0, 0.1, 0.1]},
                {"confidence": 0.7, "bbox": [0, 0, 320, 240]}
            ]
        });
        let result = parse_response(&body, None);
        assert!(matches!(result, Err(PipelineError::InvalidResponse(_))));
    }

    #[test]
    fn test_normalized_corner_box_with_edge_overshoot() {
        let body = json!({
            "predictions": [{"confidence": 0.9, "bbox": [0.6, 0.6, 1.0000001, 0.95]}]
        });

        for dims in [Some((640, 480)), None] {
            let set = parse_response(&body, dims).unwrap();
            assert_eq!(set.len(), 1, "dims {:?}", dims);
            let p = &set.predictions()[0];
            assert!(approx(p.bbox.x2, 1.0));
            assert!(approx(p.area, 0.4 * 0.35));
            assert_eq!(p.severity, Severity::Critical);
        }
    }

    #[test]
    fn test_normalized_center_box_reaching_past_edge() {
        let body = json!({
            "predictions": [{"confidence": 0.9, "x": 0.9, "y": 0.5, "width": 0.4, "height": 0.4}]
        });

        for dims in [Some((640, 480)), None] {
            let set = parse_response(&body, dims).unwrap();
            let p = &set.predictions()[0];
            assert!(approx(p.bbox.x1, 0.7));
            assert!(approx(p.bbox.x2, 1.0));
            assert!(approx(p.area, 0.3 * 0.4));
            assert_eq!(p.severity, Severity::Critical);
        }
    }

    #[test]
    fn test_malformed_entries_skipped_not_fatal() {
        let body = json!({
            "predictions": [
                {"bbox": [0.1, 0.1, 0.2, 0.2]},
                {"confidence": 1.7, "bbox": [0.1, 0.1, 0.2, 0.2]},
                {"confidence": 0.5, "bbox": [0.1, 0.1]},
                {"confidence": 0.5},
                {"confidence": 0.5, "bbox": [0.5, 0.5, 0.1, 0.1]},
                "not an object",
                {"confidence": 0.4, "bbox": [0.0, 0.0, 0.1, 0.1]}
            ]
        });
        let set = parse_response(&body, None).unwrap();

        assert_eq!(set.len(), 1);
        assert!(approx(set.predictions()[0].confidence, 0.4));
    }

    #[test]
    fn test_missing_predictions_array_is_error() {
        let result = parse_response(&json!({"error": "model not loaded"}), None);
        assert!(matches!(result, Err(PipelineError::InvalidResponse(_))));

        let result = parse_response(&json!({"predictions": "none"}), None);
        assert!(matches!(result, Err(PipelineError::InvalidResponse(_))));
    }

    #[test]
    fn test_empty_predictions_is_valid() {
        let set = parse_response(&json!({"predictions": []}), None).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.summary().count, 0);
        assert!(set.summary().best.is_none());
    }

    #[test]
    fn test_summary_best_and_counts() {
        let set = PredictionSet::new(vec![
            Prediction::new("a", 0.3, BoundingBox { x1: 0.0, y1: 0.0, x2: 0.01, y2: 0.01 }),
            Prediction::new("b", 0.95, BoundingBox { x1: 0.0, y1: 0.0, x2: 0.5, y2: 0.5 }),
            Prediction::new("c", 0.6, BoundingBox { x1: 0.0, y1: 0.0, x2: 0.5, y2: 0.5 }),
        ]);

        let summary = set.summary();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.best.as_ref().map(|p| p.class_name.as_str()), Some("b"));
        assert_eq!(summary.severity_counts.critical, 1);
        assert_eq!(summary.severity_counts.major, 1);
        assert_eq!(summary.severity_counts.negligible, 1);
        assert_eq!(summary.severity_counts.total(), 3);
    }

    #[test]
    fn test_coordinates_clamped_into_unit_square() {
        let body = json!({
            "image": {"width": 100, "height": 100},
            "predictions": [{"confidence": 0.9, "x": 95, "y": 50, "width": 20, "height": 20}]
        });
        let set = parse_response(&body, None).unwrap();
        assert!(approx(set.predictions()[0].bbox.x2, 1.0));
    }
}

//! Ejection policy.
//!
//! Pure mapping from a [`PredictionSet`] to an eject/pass decision. Thresholds
//! are always injected; nothing here reads configuration or clocks.

use crate::config::EjectionThresholds;
use crate::imaging::PredictionSet;
use std::fmt;

/// First rule that fired for an ejected piece.
#[derive(Debug, Clone, PartialEq)]
pub enum EjectReason {
    /// A single prediction met both the confidence and area thresholds.
    Prediction {
        index: usize,
        confidence: f64,
        area: f64,
    },
    CriticalCount(usize),
    MajorCount(usize),
    TotalDefects(usize),
}

impl fmt::Display for EjectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EjectReason::Prediction {
                index,
                confidence,
                area,
            } => write!(
                f,
                "defect {} confidence {:.3} area {:.6}",
                index + 1,
                confidence,
                area
            ),
            EjectReason::CriticalCount(n) => write!(f, "{} critical defects", n),
            EjectReason::MajorCount(n) => write!(f, "{} major defects", n),
            EjectReason::TotalDefects(n) => write!(f, "{} total defects", n),
        }
    }
}

/// Evaluate the rules in order and return the first one that fires.
pub fn evaluate(predictions: &PredictionSet, thresholds: &EjectionThresholds) -> Option<EjectReason> {
    for (index, prediction) in predictions.predictions().iter().enumerate() {
        if prediction.confidence >= thresholds.confidence_min && prediction.area >= thresholds.area_max {
            return Some(EjectReason::Prediction {
                index,
                confidence: prediction.confidence,
                area: prediction.area,
            });
        }
    }

    let counts = &predictions.summary().severity_counts;
    if counts.critical >= thresholds.critical_count {
        return Some(EjectReason::CriticalCount(counts.critical));
    }
    if counts.major >= thresholds.major_count {
        return Some(EjectReason::MajorCount(counts.major));
    }
    if counts.total() >= thresholds.total_defects_min {
        return Some(EjectReason::TotalDefects(counts.total()));
    }

    None
}

/// `true` when the piece must be ejected.
pub fn decide(predictions: &PredictionSet, thresholds: &EjectionThresholds) -> bool {
    evaluate(predictions, thresholds).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BoundingBox, Prediction};

    fn prediction(confidence: f64, side: f64) -> Prediction {
        Prediction::new(
            "defect",
            confidence,
            BoundingBox {
                x1: 0.0,
                y1: 0.0,
                x2: side,
                y2: side,
            },
        )
    }

    fn strict() -> EjectionThresholds {
        EjectionThresholds {
            confidence_min: 0.9,
            area_max: 0.5,
            critical_count: 5,
            major_count: 5,
            total_defects_min: 5,
            fail_safe_eject: true,
        }
    }

    #[test]
    fn test_large_confident_defect_ejects_with_defaults() {
        let set = PredictionSet::new(vec![Prediction::new(
            "scratch",
            0.9,
            BoundingBox {
                x1: 0.1,
                y1: 0.1,
                x2: 0.5,
                y2: 0.5,
            },
        )]);
        assert!(decide(&set, &EjectionThresholds::default()));
    }

    #[test]
    fn test_empty_set_passes() {
        assert!(!decide(&PredictionSet::default(), &EjectionThresholds::default()));
    }

    #[test]
    fn test_any_detection_ejects_with_defaults() {
        // Tiny, low-confidence detection still counts toward total_defects_min
        let set = PredictionSet::new(vec![prediction(0.001, 0.001)]);
        assert_eq!(
            evaluate(&set, &EjectionThresholds::default()),
            Some(EjectReason::TotalDefects(1))
        );
    }

    #[test]
    fn test_single_rule_needs_both_thresholds() {
        let thresholds = strict();
        assert!(!decide(&PredictionSet::new(vec![prediction(0.95, 0.1)]), &thresholds));
        assert!(!decide(&PredictionSet::new(vec![prediction(0.5, 0.9)]), &thresholds));
        assert!(matches!(
            evaluate(&PredictionSet::new(vec![prediction(0.95, 0.9)]), &thresholds),
            Some(EjectReason::Prediction { index: 0, .. })
        ));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let thresholds = EjectionThresholds {
            confidence_min: 0.5,
            area_max: 0.25,
            ..strict()
        };
        assert!(decide(&PredictionSet::new(vec![prediction(0.5, 0.5)]), &thresholds));
    }

    #[test]
    fn test_critical_count_rule() {
        let thresholds = EjectionThresholds {
            critical_count: 2,
            ..strict()
        };
        let one = PredictionSet::new(vec![prediction(0.85, 0.3)]);
        let two = PredictionSet::new(vec![prediction(0.85, 0.3), prediction(0.88, 0.3)]);

        assert!(!decide(&one, &thresholds));
        assert_eq!(evaluate(&two, &thresholds), Some(EjectReason::CriticalCount(2)));
    }

    #[test]
    fn test_major_count_rule() {
        let thresholds = EjectionThresholds {
            major_count: 1,
            ..strict()
        };
        let set = PredictionSet::new(vec![prediction(0.6, 0.3)]);
        assert_eq!(evaluate(&set, &thresholds), Some(EjectReason::MajorCount(1)));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(EjectReason::MajorCount(2).to_string(), "2 major defects");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_prediction() -> impl Strategy<Value = Prediction> {
            (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(c, s)| prediction(c, s))
        }

        fn arb_thresholds() -> impl Strategy<Value = EjectionThresholds> {
            (0.0f64..=1.0, 0.0f64..=1.0, 1usize..5, 1usize..5, 1usize..8).prop_map(
                |(confidence_min, area_max, critical_count, major_count, total_defects_min)| {
                    EjectionThresholds {
                        confidence_min,
                        area_max,
                        critical_count,
                        major_count,
                        total_defects_min,
                        fail_safe_eject: true,
                    }
                },
            )
        }

        proptest! {
            #[test]
            fn prop_decide_is_deterministic(
                predictions in proptest::collection::vec(arb_prediction(), 0..10),
                thresholds in arb_thresholds(),
            ) {
                let set = PredictionSet::new(predictions);
                let first = decide(&set, &thresholds);
                for _ in 0..3 {
                    prop_assert_eq!(decide(&set, &thresholds), first);
                }
                prop_assert_eq!(decide(&set.clone(), &thresholds.clone()), first);
            }

            #[test]
            fn prop_count_rule_matches_total(
                predictions in proptest::collection::vec(arb_prediction(), 0..10),
                total_defects_min in 1usize..10,
            ) {
                let thresholds = EjectionThresholds {
                    confidence_min: 1.0,
                    area_max: 1.0,
                    critical_count: usize::MAX,
                    major_count: usize::MAX,
                    total_defects_min,
                    fail_safe_eject: true,
                };
                let set = PredictionSet::new(predictions);
                let full_box = set.predictions().iter().any(|p| p.confidence >= 1.0 && p.area >= 1.0);
                prop_assert_eq!(decide(&set, &thresholds), full_box || set.len() >= total_defects_min);
            }
        }
    }
}

//! Ejection policy thresholds

use serde::{Deserialize, Serialize};

/// Thresholds consumed by [`crate::policy::decide`].
///
/// Shipped defaults are deliberately hyper-sensitive: any detection at all
/// ejects the piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EjectionThresholds {
    /// Minimum confidence for the single-prediction rule
    pub confidence_min: f64,
    /// Minimum normalized area for the single-prediction rule
    pub area_max: f64,
    pub critical_count: usize,
    pub major_count: usize,
    pub total_defects_min: usize,
    /// Eject when inference fails or returns nothing usable
    pub fail_safe_eject: bool,
}

impl Default for EjectionThresholds {
    fn default() -> Self {
        Self {
            confidence_min: 0.01,
            area_max: 0.0001,
            critical_count: 1,
            major_count: 1,
            total_defects_min: 1,
            fail_safe_eject: true,
        }
    }
}

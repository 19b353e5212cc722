//! Platt-scaling calibration for the reported confidence.
//!
//! The calibration record is fitted offline; at runtime it is a pure
//! logistic map from the fused risk score to a probability.

use crate::error::{GuardError, Result};
use serde::Deserialize;
use std::path::Path;

/// Fitted logistic parameters `sigma(A * x + B)`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlattParameters {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
}

#[derive(Debug, Deserialize)]
struct CalibrationFile {
    platt_parameters: PlattParameters,
}

/// Load `platt_parameters.{A,B}` from a calibration JSON file.
///
/// # Errors
///
/// Returns `GuardError::Config` when the file cannot be read or parsed; the
/// analyzer downgrades this to a warning and falls back to the variance
/// confidence.
pub fn load_calibration(path: &Path) -> Result<PlattParameters> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| GuardError::config(format!("cannot read calibration {}: {e}", path.display())))?;
    let file: CalibrationFile =
        serde_json::from_str(&raw).map_err(|e| GuardError::config(format!("invalid calibration file: {e}")))?;
    Ok(file.platt_parameters)
}

/// Calibrated confidence for a risk score, clamped to [0, 1].
pub fn platt_confidence(risk_score: f64, params: &PlattParameters) -> f64 {
    (1.0 / (1.0 + (params.a * risk_score + params.b).exp())).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistic_midpoint_is_half() {
        let params = PlattParameters { a: -4.0, b: 2.0 };
        assert!((platt_confidence(0.5, &params) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn negative_slope_makes_confidence_increase_with_risk() {
        let params = PlattParameters { a: -4.0, b: 2.0 };
        assert!(platt_confidence(0.9, &params) > platt_confidence(0.1, &params));
        for risk in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let c = platt_confidence(risk, &params);
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn calibration_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        std::fs::write(&path, r#"{"platt_parameters": {"A": -3.5, "B": 1.2}}"#).unwrap();
        let params = load_calibration(&path).unwrap();
        assert!((params.a + 3.5).abs() < 1e-12);
        assert!((params.b - 1.2).abs() < 1e-12);
    }

    #[test]
    fn malformed_calibration_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(load_calibration(&path), Err(GuardError::Config { .. })));
    }
}

//! Result types shared across the pipeline.
//!
//! Everything here serializes with stable field names; the JSON shape of
//! [`AnalysisReport`] is the crate's public result envelope.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tiered classification of an analyzed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Safe,
    Suspicious,
    Dangerous,
}

/// How the reported confidence was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMethod {
    /// Score-variance heuristic, clamped to [0.5, 0.99].
    Variance,
    /// Logistic calibration `sigma(A * risk + B)` from a fitted record.
    PlattScaling,
}

/// Terminal status of a single detection module run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Ok,
    Timeout,
    Error,
}

/// Outcome of one detection module within a request.
///
/// A `None` score means the module did not contribute to the weighted mean
/// (it errored or overran its deadline under fail-open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResult {
    pub score: Option<f64>,
    pub status: ModuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub details: serde_json::Value,
}

impl ModuleResult {
    /// A successful result carrying a score and module-specific details.
    pub fn ok(score: f64, latency_ms: u64, details: serde_json::Value) -> Self {
        Self {
            score: Some(score),
            status: ModuleStatus::Ok,
            latency_ms: Some(latency_ms),
            details,
        }
    }

    /// A non-contributing result with an explanatory message.
    pub fn degraded(status: ModuleStatus, message: impl Into<String>) -> Self {
        Self {
            score: None,
            status,
            latency_ms: None,
            details: serde_json::json!({ "message": message.into() }),
        }
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Facts about the input image, before and after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub filename: String,
    /// Original container format tag (e.g. "PNG"), when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Dimensions as decoded, after EXIF orientation.
    pub dimensions: Dimensions,
    pub size_bytes: u64,
    /// Dimensions of the normalized RGB buffer the modules analyzed.
    pub normalized_dimensions: Dimensions,
}

/// Classification thresholds actually applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdLadder {
    pub safe: f64,
    pub suspicious: f64,
    pub dangerous: f64,
}

impl Default for ThresholdLadder {
    fn default() -> Self {
        Self {
            safe: 0.4,
            suspicious: 0.6,
            dangerous: 0.6,
        }
    }
}

impl ThresholdLadder {
    /// Ladder with a single override value in every slot.
    pub fn uniform(threshold: f64) -> Self {
        Self {
            safe: threshold,
            suspicious: threshold,
            dangerous: threshold,
        }
    }
}

/// Fused risk score, classification and calibrated confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub classification: Classification,
    pub risk_score: f64,
    pub confidence: f64,
    pub confidence_raw: f64,
    pub confidence_method: ConfidenceMethod,
    /// Ladder applied to this request (an override is copied into all slots).
    pub threshold_used: ThresholdLadder,
    /// Ladder from configuration, regardless of overrides.
    pub thresholds: ThresholdLadder,
}

/// Full analysis envelope returned for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub request_id: String,
    /// RFC 3339 UTC timestamp of the analysis. Not an input to scoring.
    pub timestamp: String,
    pub processing_time_ms: u64,
    pub image_info: ImageInfo,
    pub result: ResultSummary,
    /// Per-module results in deterministic run order.
    pub module_scores: IndexMap<String, ModuleResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marked_image_path: Option<String>,
}

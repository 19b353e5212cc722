//! Configuration loading and management.
//!
//! The configuration tree mirrors the recognized option groups (`general`,
//! `scoring`, `modules.*`, `output`). It is built once at analyzer
//! construction and read-only afterwards; per-request options live in
//! [`crate::core::orchestrator::AnalyzeOptions`] instead.

use crate::error::{GuardError, Result};
use crate::types::ThresholdLadder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical identifiers of the five detection modules, in run order.
pub const MODULE_IDS: [&str; 5] = [
    "text_extraction",
    "hidden_text",
    "frequency_analysis",
    "steganography",
    "structural",
];

/// Top-level configuration.
///
/// All groups carry serde defaults, so a partial YAML document (or an empty
/// one) yields the same tree as [`Config::default`].
///
/// # Example
///
/// ```rust
/// use imageguard::core::config::Config;
///
/// let config = Config::from_yaml_str("general:\n  fail_open: false\n").unwrap();
/// assert!(!config.general.fail_open);
/// assert_eq!(config.scoring.thresholds.safe, 0.4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub scoring: ScoringConfig,
    pub modules: ModulesConfig,
    pub output: OutputConfig,
}

/// Byte/dimension limits, deadlines and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Maximum accepted file size, in megabytes.
    pub max_image_size_mb: u64,
    /// Images are downsized so `max(width, height)` does not exceed this.
    pub target_resolution: u32,
    /// Reject images whose decoded dimensions exceed this on either axis.
    pub max_dimension: u32,
    /// Soft per-module deadline, checked after the module completes.
    pub timeout_seconds: u64,
    /// When false, the first module error or deadline miss fails the whole
    /// request closed (DANGEROUS, risk 1.0).
    pub fail_open: bool,
    /// Compare file magic bytes against the extension before decoding.
    pub validate_magic: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: 50,
            target_resolution: 1920,
            max_dimension: 3000,
            timeout_seconds: 30,
            fail_open: true,
            validate_magic: true,
        }
    }
}

impl GeneralConfig {
    /// Size limit in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_image_size_mb * 1024 * 1024
    }
}

/// Threshold ladder and optional confidence calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: ThresholdLadder,
    /// Path to a JSON file with `platt_parameters.{A,B}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_data: Option<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdLadder::default(),
            calibration_data: None,
        }
    }
}

/// Per-module enable flags, weights and tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    pub text_extraction: TextExtractionConfig,
    pub hidden_text: HiddenTextConfig,
    pub frequency_analysis: FrequencyConfig,
    pub steganography: SteganographyConfig,
    pub structural: StructuralConfig,
}

impl ModulesConfig {
    /// Canonical ids of the modules enabled in this configuration, in run order.
    pub fn enabled_ids(&self) -> Vec<&'static str> {
        let mut ids = Vec::with_capacity(MODULE_IDS.len());
        if self.text_extraction.enabled {
            ids.push("text_extraction");
        }
        if self.hidden_text.enabled {
            ids.push("hidden_text");
        }
        if self.frequency_analysis.enabled {
            ids.push("frequency_analysis");
        }
        if self.steganography.enabled {
            ids.push("steganography");
        }
        if self.structural.enabled {
            ids.push("structural");
        }
        ids
    }

    /// Configured fusion weight for a canonical module id.
    pub fn weight_of(&self, id: &str) -> f64 {
        match id {
            "text_extraction" => self.text_extraction.weight,
            "hidden_text" => self.hidden_text.weight,
            "frequency_analysis" => self.frequency_analysis.weight,
            "steganography" => self.steganography.weight,
            "structural" => self.structural.weight,
            _ => 1.0,
        }
    }
}

/// Visible-text OCR + pattern module options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextExtractionConfig {
    pub enabled: bool,
    pub weight: f64,
    /// OCR language codes, joined with `+` for tesseract.
    pub languages: Vec<String>,
    /// YAML pattern override file; defaults are used when absent or unreadable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_path: Option<PathBuf>,
    /// Explicit tesseract executable; `tesseract` from PATH otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tesseract_cmd: Option<PathBuf>,
}

impl Default for TextExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 2.0,
            languages: vec!["eng".to_string()],
            pattern_path: None,
            tesseract_cmd: None,
        }
    }
}

/// Hidden-text recovery module options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenTextConfig {
    pub enabled: bool,
    pub weight: f64,
    /// Binarization thresholds applied to the CLAHE image, each in 0..=255.
    pub contrast_thresholds: Vec<u8>,
    /// A grid cell is flagged when its edge-pixel ratio exceeds this.
    pub edge_density_threshold: f64,
    /// The edge map is partitioned into `edge_grid_size`^2 cells.
    pub edge_grid_size: u32,
    /// Reserved region-of-interest switches; recognized but not yet consulted
    /// by the detector.
    pub analyze_corners: bool,
    pub analyze_borders: bool,
}

impl Default for HiddenTextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.5,
            contrast_thresholds: vec![50, 100, 150, 200, 250],
            edge_density_threshold: 0.15,
            edge_grid_size: 4,
            analyze_corners: true,
            analyze_borders: true,
        }
    }
}

/// Frequency-domain module options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub enabled: bool,
    pub weight: f64,
    pub fft_enabled: bool,
    pub dct_enabled: bool,
    pub wavelet_enabled: bool,
    pub fft_threshold: f64,
    pub dct_threshold: f64,
    pub wavelet_threshold: f64,
    pub wavelet_type: String,
    pub wavelet_levels: u32,
    /// JSON file with per-metric `{mean,std}` baseline statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_model: Option<PathBuf>,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            fft_enabled: true,
            dct_enabled: true,
            wavelet_enabled: true,
            fft_threshold: 0.7,
            dct_threshold: 0.6,
            wavelet_threshold: 0.5,
            wavelet_type: "haar".to_string(),
            wavelet_levels: 1,
            baseline_model: None,
        }
    }
}

/// Steganography-statistics module options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteganographyConfig {
    pub enabled: bool,
    pub weight: f64,
    pub lsb_analysis: bool,
    pub chi_square_test: bool,
    pub rs_analysis: bool,
    pub spa_analysis: bool,
}

impl Default for SteganographyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            lsb_analysis: true,
            chi_square_test: true,
            rs_analysis: true,
            spa_analysis: false,
        }
    }
}

/// Structural (QR/barcode/screenshot) module options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralConfig {
    pub enabled: bool,
    pub weight: f64,
    pub detect_qr: bool,
    pub detect_barcodes: bool,
    pub detect_screenshots: bool,
    /// Run pattern matching over decoded QR/barcode payloads.
    pub analyze_decoded_content: bool,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            detect_qr: true,
            detect_barcodes: true,
            detect_screenshots: true,
            analyze_decoded_content: true,
        }
    }
}

/// Result-envelope output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub include_extracted_text: bool,
    /// Extracted text longer than this is truncated with a trailing ellipsis.
    pub max_text_length: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_extracted_text: true,
            max_text_length: 10_000,
        }
    }
}

impl Config {
    /// Parse a configuration from YAML text.
    ///
    /// Unknown fields are ignored; missing groups fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` when the document is not valid YAML or a
    /// recognized option has the wrong type.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| GuardError::config(format!("invalid configuration: {e}")))
    }

    /// Load a configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` when the file cannot be read or parsed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GuardError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&raw)
    }
}

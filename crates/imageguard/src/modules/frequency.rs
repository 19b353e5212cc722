//! Frequency-domain module: FFT, block-DCT and wavelet energy ratios, with
//! an optional per-metric baseline deviation.
//!
//! All analyses run on the image as single-channel `f32` in [0, 1]. Each
//! ratio maps to a sub-score via `clamp01((ratio - threshold) / (1 -
//! threshold))`; the module score is the mean of the enabled sub-scores
//! (plus the baseline sub-score when a baseline is loaded).

use crate::core::config::FrequencyConfig;
use crate::error::{GuardError, Result};
use crate::modules::{DetectionModule, ModuleContext, ModuleOutcome};
use crate::preprocess::PreparedImage;
use crate::signal::{dct, fft, wavelet};
use crate::vision;
use ndarray::Array2;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

const EPSILON: f64 = 1e-8;

/// Per-metric reference statistics fitted offline over a benign corpus.
///
/// File shape: a flat JSON object with `<metric>_{mean,std}` keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrequencyBaseline {
    pub fft_high_freq_ratio_mean: f64,
    pub fft_high_freq_ratio_std: f64,
    pub dct_hf_lf_ratio_mean: f64,
    pub dct_hf_lf_ratio_std: f64,
    pub wavelet_detail_ratio_mean: f64,
    pub wavelet_detail_ratio_std: f64,
}

impl Default for FrequencyBaseline {
    fn default() -> Self {
        Self {
            fft_high_freq_ratio_mean: 0.2,
            fft_high_freq_ratio_std: 0.05,
            dct_hf_lf_ratio_mean: 0.2,
            dct_hf_lf_ratio_std: 0.05,
            wavelet_detail_ratio_mean: 0.2,
            wavelet_detail_ratio_std: 0.05,
        }
    }
}

impl FrequencyBaseline {
    /// Load a baseline file.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` when the file cannot be read or parsed;
    /// the caller downgrades this to a warning and runs without a baseline.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GuardError::config(format!("cannot read baseline {}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| GuardError::config(format!("invalid baseline file: {e}")))
    }
}

/// `|x - mean| / std`, defined as 0 when `std <= 0`.
fn deviation(value: f64, mean: f64, std: f64) -> f64 {
    if std <= 0.0 {
        0.0
    } else {
        (value - mean).abs() / std
    }
}

fn ratio_to_score(ratio: f64, threshold: f64) -> f64 {
    let denom = (1.0 - threshold).max(1e-6);
    ((ratio - threshold) / denom).clamp(0.0, 1.0)
}

pub struct FrequencyModule {
    config: FrequencyConfig,
    baseline: Option<FrequencyBaseline>,
}

impl FrequencyModule {
    /// Build the module, loading the baseline file if one is configured.
    /// An unreadable baseline degrades to no baseline with a warning.
    pub fn new(config: FrequencyConfig) -> Self {
        let baseline = config.baseline_model.as_ref().and_then(|path| {
            match FrequencyBaseline::load(path) {
                Ok(baseline) => Some(baseline),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "frequency baseline unavailable");
                    None
                }
            }
        });
        Self { config, baseline }
    }

    #[cfg(test)]
    fn with_baseline(config: FrequencyConfig, baseline: Option<FrequencyBaseline>) -> Self {
        Self { config, baseline }
    }

    /// High-frequency energy share of the shifted FFT spectrum, outside the
    /// center disk of radius `min(h, w) / 8`.
    fn fft_ratio(gray: &Array2<f32>) -> f64 {
        let magnitude = fft::fft2_shifted_magnitude(gray);
        let (height, width) = magnitude.dim();
        if height == 0 || width == 0 {
            return 0.0;
        }
        let center_y = height as f64 / 2.0;
        let center_x = width as f64 / 2.0;
        let radius = ((height / 2).min(width / 2) / 4) as f64;
        let radius_sq = radius * radius;

        let mut low = EPSILON;
        let mut high = EPSILON;
        for ((y, x), value) in magnitude.indexed_iter() {
            let dy = y as f64 - center_y;
            let dx = x as f64 - center_x;
            if dy * dy + dx * dx <= radius_sq {
                low += f64::from(*value);
            } else {
                high += f64::from(*value);
            }
        }
        high / (low + high)
    }

    fn dct_ratio(gray: &Array2<f32>) -> f64 {
        match dct::block_energies(gray) {
            Some((lf, hf)) => hf / (hf + lf + 1e-6),
            None => 0.0,
        }
    }

    fn wavelet_ratio(&self, gray: &Array2<f32>) -> f64 {
        let decomposition = wavelet::haar_decompose(gray, self.config.wavelet_levels);
        if decomposition.details.is_empty() {
            return 0.0;
        }
        let mean_abs = |a: &Array2<f32>| -> f64 {
            if a.is_empty() {
                0.0
            } else {
                a.iter().map(|v| f64::from(v.abs())).sum::<f64>() / a.len() as f64
            }
        };
        let detail_energy: f64 = decomposition
            .details
            .iter()
            .map(|bands| mean_abs(&bands.horizontal) + mean_abs(&bands.vertical) + mean_abs(&bands.diagonal))
            .sum();
        let approx_energy = mean_abs(&decomposition.approx) + 1e-6;
        detail_energy / (detail_energy + approx_energy)
    }
}

impl DetectionModule for FrequencyModule {
    fn id(&self) -> &'static str {
        "frequency_analysis"
    }

    fn run(&self, image: &PreparedImage, _ctx: &ModuleContext<'_>) -> Result<ModuleOutcome> {
        if self.config.wavelet_enabled
            && self.config.wavelet_type != "haar"
            && self.config.wavelet_type != "db1"
        {
            tracing::warn!(
                wavelet_type = %self.config.wavelet_type,
                "unsupported wavelet type, falling back to haar"
            );
        }

        let gray = vision::gray_to_unit_f32(&vision::grayscale(&image.rgb));

        let mut details = serde_json::Map::new();
        let mut scores: Vec<f64> = Vec::new();

        let mut fft_ratio = 0.0;
        if self.config.fft_enabled {
            fft_ratio = Self::fft_ratio(&gray);
            let score = ratio_to_score(fft_ratio, self.config.fft_threshold);
            details.insert(
                "fft".to_string(),
                json!({ "score": score, "high_freq_ratio": fft_ratio }),
            );
            scores.push(score);
        } else {
            details.insert("fft".to_string(), json!({ "score": 0.0, "disabled": true }));
        }

        let mut dct_ratio = 0.0;
        if self.config.dct_enabled {
            dct_ratio = Self::dct_ratio(&gray);
            let score = ratio_to_score(dct_ratio, self.config.dct_threshold);
            details.insert(
                "dct".to_string(),
                json!({ "score": score, "hf_lf_ratio": dct_ratio }),
            );
            scores.push(score);
        } else {
            details.insert("dct".to_string(), json!({ "score": 0.0, "disabled": true }));
        }

        let mut wavelet_ratio = 0.0;
        if self.config.wavelet_enabled {
            wavelet_ratio = self.wavelet_ratio(&gray);
            let score = ratio_to_score(wavelet_ratio, self.config.wavelet_threshold);
            details.insert(
                "wavelet".to_string(),
                json!({
                    "score": score,
                    "enabled": true,
                    "detail_ratio": wavelet_ratio,
                    "wavelet_type": "haar",
                    "levels": self.config.wavelet_levels,
                }),
            );
            scores.push(score);
        } else {
            details.insert("wavelet".to_string(), json!({ "score": 0.0, "enabled": false }));
        }

        let baseline_score = match &self.baseline {
            Some(baseline) => {
                let fft_dev = deviation(fft_ratio, baseline.fft_high_freq_ratio_mean, baseline.fft_high_freq_ratio_std);
                let dct_dev = deviation(dct_ratio, baseline.dct_hf_lf_ratio_mean, baseline.dct_hf_lf_ratio_std);
                let wave_dev = deviation(
                    wavelet_ratio,
                    baseline.wavelet_detail_ratio_mean,
                    baseline.wavelet_detail_ratio_std,
                );
                let score = ((fft_dev + dct_dev + wave_dev) / 3.0).min(1.0);
                scores.push(score);
                score
            }
            None => 0.0,
        };
        details.insert("baseline_score".to_string(), json!(baseline_score));

        let score = if scores.is_empty() {
            0.0
        } else {
            (scores.iter().sum::<f64>() / scores.len() as f64).clamp(0.0, 1.0)
        };

        Ok(ModuleOutcome {
            score,
            details: serde_json::Value::Object(details),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternStore;
    use crate::types::{Dimensions, ImageInfo};
    use image::RgbImage;

    fn prepared_from_fn(values: impl Fn(u32, u32) -> u8, width: u32, height: u32) -> PreparedImage {
        let mut rgb = RgbImage::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels_mut() {
            let v = values(x, y);
            *pixel = image::Rgb([v, v, v]);
        }
        PreparedImage {
            rgb,
            info: ImageInfo {
                filename: "fixture.png".to_string(),
                format: Some("PNG".to_string()),
                dimensions: Dimensions { width, height },
                size_bytes: 0,
                normalized_dimensions: Dimensions { width, height },
            },
        }
    }

    fn run_module(image: &PreparedImage, module: FrequencyModule) -> ModuleOutcome {
        let patterns = PatternStore::default_set();
        struct NoOcr;
        impl crate::ocr::OcrEngine for NoOcr {
            fn recognize(
                &self,
                _: &image::DynamicImage,
                _: &[String],
                _: crate::ocr::PageSegMode,
            ) -> Result<crate::ocr::OcrOutput> {
                unreachable!("frequency analysis does not use OCR")
            }
        }
        let languages = vec!["eng".to_string()];
        let ctx = ModuleContext {
            patterns: &patterns,
            ocr: &NoOcr,
            languages: &languages,
            include_text: true,
            max_text_length: 10_000,
        };
        module.run(image, &ctx).unwrap()
    }

    #[test]
    fn flat_image_scores_zero_everywhere() {
        let image = prepared_from_fn(|_, _| 180, 64, 64);
        let outcome = run_module(&image, FrequencyModule::new(FrequencyConfig::default()));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.details["fft"]["score"], 0.0);
        assert_eq!(outcome.details["dct"]["score"], 0.0);
        assert_eq!(outcome.details["wavelet"]["score"], 0.0);
        assert_eq!(outcome.details["baseline_score"], 0.0);
    }

    #[test]
    fn pixel_noise_raises_ratios_over_flat() {
        // Deterministic high-frequency texture.
        let noisy = prepared_from_fn(|x, y| if (x * 31 + y * 17) % 2 == 0 { 0 } else { 255 }, 64, 64);
        let flat = prepared_from_fn(|_, _| 128, 64, 64);

        let noisy_out = run_module(&noisy, FrequencyModule::new(FrequencyConfig::default()));
        let flat_out = run_module(&flat, FrequencyModule::new(FrequencyConfig::default()));

        let ratio = |o: &ModuleOutcome, key: &str, field: &str| o.details[key][field].as_f64().unwrap();
        assert!(ratio(&noisy_out, "fft", "high_freq_ratio") > ratio(&flat_out, "fft", "high_freq_ratio"));
        assert!(ratio(&noisy_out, "dct", "hf_lf_ratio") > ratio(&flat_out, "dct", "hf_lf_ratio"));
        assert!(ratio(&noisy_out, "wavelet", "detail_ratio") > ratio(&flat_out, "wavelet", "detail_ratio"));
        assert!(noisy_out.score >= flat_out.score);
    }

    #[test]
    fn disabled_analyses_do_not_contribute() {
        let image = prepared_from_fn(|x, _| if x % 2 == 0 { 0 } else { 255 }, 32, 32);
        let config = FrequencyConfig {
            fft_enabled: false,
            dct_enabled: false,
            wavelet_enabled: true,
            ..FrequencyConfig::default()
        };
        let outcome = run_module(&image, FrequencyModule::new(config));
        assert_eq!(outcome.details["fft"]["disabled"], true);
        assert_eq!(outcome.details["dct"]["disabled"], true);
        assert_eq!(outcome.details["wavelet"]["enabled"], true);
    }

    #[test]
    fn baseline_deviation_is_zero_for_non_positive_std() {
        assert_eq!(deviation(0.9, 0.2, 0.0), 0.0);
        assert_eq!(deviation(0.9, 0.2, -1.0), 0.0);
        assert!((deviation(0.3, 0.2, 0.05) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn baseline_adds_a_contributing_subscore() {
        let image = prepared_from_fn(|x, y| ((x ^ y) % 7 * 36) as u8, 64, 64);
        let without = run_module(
            &image,
            FrequencyModule::with_baseline(FrequencyConfig::default(), None),
        );
        // A degenerate baseline (tiny std) makes any observed ratio deviate.
        let strict = FrequencyBaseline {
            fft_high_freq_ratio_std: 1e-9,
            dct_hf_lf_ratio_std: 1e-9,
            wavelet_detail_ratio_std: 1e-9,
            ..FrequencyBaseline::default()
        };
        let with = run_module(
            &image,
            FrequencyModule::with_baseline(FrequencyConfig::default(), Some(strict)),
        );
        assert_eq!(with.details["baseline_score"], 1.0);
        assert!(with.score >= without.score);
    }

    #[test]
    fn baseline_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        std::fs::write(
            &path,
            r#"{"fft_high_freq_ratio_mean": 0.3, "fft_high_freq_ratio_std": 0.1}"#,
        )
        .unwrap();
        let baseline = FrequencyBaseline::load(&path).unwrap();
        assert!((baseline.fft_high_freq_ratio_mean - 0.3).abs() < 1e-9);
        // Missing keys fall back to the documented defaults.
        assert!((baseline.dct_hf_lf_ratio_std - 0.05).abs() < 1e-9);

        assert!(FrequencyBaseline::load(Path::new("/nonexistent.json")).is_err());
    }
}

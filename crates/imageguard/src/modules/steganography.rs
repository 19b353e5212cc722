//! Steganography statistics over the grayscale luminance plane: LSB
//! randomness, a pairs-of-values chi-square test, RS analysis and optional
//! sample-pair analysis.
//!
//! Elevated LSB randomness is treated as evidence of embedding, so the
//! entropy feeds the sub-score directly; naturally noisy images score higher
//! too, which is why every sub-signal is exposed in details for downstream
//! tuning.

use crate::core::config::SteganographyConfig;
use crate::error::Result;
use crate::modules::{DetectionModule, ModuleContext, ModuleOutcome};
use crate::preprocess::PreparedImage;
use crate::vision;
use ndarray::Array2;
use serde_json::json;

const RS_GROUP_SIZE: usize = 4;
const CHI_SQUARE_ALPHA: f64 = 0.05;

pub struct SteganographyModule {
    config: SteganographyConfig,
}

impl SteganographyModule {
    pub fn new(config: SteganographyConfig) -> Self {
        Self { config }
    }
}

/// LSB plane statistics: ones ratio, binary entropy, and a flag for plainly
/// non-random planes.
fn lsb_analysis(gray: &Array2<u8>) -> (f64, f64, bool) {
    let total = gray.len();
    if total == 0 {
        return (0.0, 0.0, true);
    }
    let ones = gray.iter().filter(|&&v| v & 1 == 1).count();
    let ones_ratio = ones as f64 / total as f64;
    let entropy = if ones_ratio == 0.0 || ones_ratio == 1.0 {
        0.0
    } else {
        -ones_ratio * ones_ratio.log2() - (1.0 - ones_ratio) * (1.0 - ones_ratio).log2()
    };
    let randomness = entropy.clamp(0.0, 1.0);
    let pattern_detected = randomness < 0.7 || ones_ratio < 0.1 || ones_ratio > 0.9;
    (ones_ratio, randomness, pattern_detected)
}

/// Pairs-of-values chi-square test with 127 degrees of freedom and a normal
/// approximation for the p-value.
fn chi_square_test(gray: &Array2<u8>) -> (f64, bool) {
    let mut hist = [0u64; 256];
    for &v in gray.iter() {
        hist[v as usize] += 1;
    }
    let mut chi_sq = 0.0f64;
    for k in 0..128 {
        let observed = hist[2 * k] as f64;
        let expected = (hist[2 * k] + hist[2 * k + 1]) as f64 / 2.0;
        if expected > 0.0 {
            chi_sq += (observed - expected).powi(2) / expected;
        }
    }
    let df = 127.0;
    let z = (chi_sq - df) / (2.0 * df).sqrt();
    let p_value = 0.5 * erfc(z / std::f64::consts::SQRT_2);
    (p_value, p_value < CHI_SQUARE_ALPHA)
}

/// Complementary error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
fn erfc(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x_abs = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x_abs);
    let poly = t
        * (0.254829592 + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let erf = 1.0 - poly * (-x_abs * x_abs).exp();
    1.0 - sign * erf
}

/// Regular/Singular group analysis: compare smoothness under LSB flipping
/// over flattened groups of four samples.
fn rs_analysis(gray: &Array2<u8>) -> (f64, bool) {
    let flat: Vec<i32> = gray.iter().map(|&v| i32::from(v)).collect();
    if flat.len() < RS_GROUP_SIZE {
        return (0.0, false);
    }

    let smoothness = |group: &[i32]| -> i32 { group.windows(2).map(|w| (w[1] - w[0]).abs()).sum() };

    let mut regular = 0u64;
    let mut singular = 0u64;
    for group in flat.chunks_exact(RS_GROUP_SIZE) {
        let flipped: Vec<i32> = group.iter().map(|v| v ^ 1).collect();
        let original = smoothness(group);
        let after_flip = smoothness(&flipped);
        if after_flip > original {
            regular += 1;
        } else if after_flip < original {
            singular += 1;
        }
    }

    let total = regular + singular;
    let rs_ratio = if total == 0 {
        0.0
    } else {
        (regular as f64 - singular as f64) / total as f64
    };
    let embedding_detected = rs_ratio.abs() < 0.1 && total > 100;
    (rs_ratio, embedding_detected)
}

/// Sample Pair Analysis over horizontally adjacent LSBs.
fn spa_analysis(gray: &Array2<u8>) -> (f64, f64) {
    let (height, width) = gray.dim();
    if width < 2 || height == 0 {
        return (0.0, 0.0);
    }
    let mut differing = 0u64;
    let mut pairs = 0u64;
    for y in 0..height {
        for x in 1..width {
            if (gray[[y, x]] & 1) != (gray[[y, x - 1]] & 1) {
                differing += 1;
            }
            pairs += 1;
        }
    }
    let diff_ratio = differing as f64 / pairs as f64;
    let estimated_rate = ((diff_ratio - 0.25) / 0.25).clamp(0.0, 1.0);
    (diff_ratio, estimated_rate)
}

impl DetectionModule for SteganographyModule {
    fn id(&self) -> &'static str {
        "steganography"
    }

    fn run(&self, image: &PreparedImage, _ctx: &ModuleContext<'_>) -> Result<ModuleOutcome> {
        let gray = vision::gray_to_u8(&vision::grayscale(&image.rgb));

        let mut details = serde_json::Map::new();
        let mut scores: Vec<f64> = Vec::new();

        if self.config.lsb_analysis {
            let (ones_ratio, randomness, pattern_detected) = lsb_analysis(&gray);
            details.insert(
                "lsb_analysis".to_string(),
                json!({
                    "randomness_score": randomness,
                    "pattern_detected": pattern_detected,
                    "ones_ratio": ones_ratio,
                }),
            );
            scores.push(randomness);
        }

        if self.config.chi_square_test {
            let (p_value, is_significant) = chi_square_test(&gray);
            details.insert(
                "chi_square_test".to_string(),
                json!({
                    "p_value": p_value,
                    "is_significant": is_significant,
                }),
            );
            scores.push(if is_significant { 1.0 } else { 0.0 });
        }

        if self.config.rs_analysis {
            let (rs_ratio, embedding_detected) = rs_analysis(&gray);
            details.insert(
                "rs_analysis".to_string(),
                json!({
                    "rs_ratio": rs_ratio,
                    "embedding_detected": embedding_detected,
                }),
            );
            scores.push((1.0 - (rs_ratio.abs() / 0.5).min(1.0)).max(0.0));
        }

        if self.config.spa_analysis {
            let (diff_ratio, estimated_rate) = spa_analysis(&gray);
            details.insert(
                "spa_analysis".to_string(),
                json!({
                    "lsb_diff_ratio": diff_ratio,
                    "estimated_embedding_rate": estimated_rate,
                }),
            );
            scores.push(estimated_rate);
        }

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

//! Score fusion: weighted aggregation, the tiered classification ladder and
//! confidence estimation.

use crate::types::{Classification, ThresholdLadder};
use ahash::AHashMap;

/// Weighted mean over modules with non-null scores; 0.0 when nothing
/// contributes. Unknown modules default to weight 1.0.
pub fn weighted_average(scores: &[(String, Option<f64>)], weights: &AHashMap<String, f64>) -> f64 {
    let mut total_weight = 0.0;
    let mut total_score = 0.0;
    for (module, score) in scores {
        let Some(score) = score else { continue };
        let weight = weights.get(module).copied().unwrap_or(1.0);
        total_score += weight * score;
        total_weight += weight;
    }
    if total_weight == 0.0 {
        0.0
    } else {
        total_score / total_weight
    }
}

/// Tiered ladder: DANGEROUS at or above `dangerous`, otherwise SUSPICIOUS at
/// or above `suspicious` *or* `safe`, otherwise SAFE.
///
/// Crossing `safe` never classifies as SAFE even when below `suspicious`;
/// the ladder is two-tier with a SAFE floor.
pub fn classify_tiered(risk_score: f64, ladder: &ThresholdLadder) -> Classification {
    if risk_score >= ladder.dangerous {
        Classification::Dangerous
    } else if risk_score >= ladder.suspicious || risk_score >= ladder.safe {
        Classification::Suspicious
    } else {
        Classification::Safe
    }
}

/// Single-threshold override: DANGEROUS at or above `threshold`, SAFE below.
pub fn classify_override(risk_score: f64, threshold: f64) -> Classification {
    if risk_score >= threshold {
        Classification::Dangerous
    } else {
        Classification::Safe
    }
}

/// Variance-based raw confidence: agreement between module scores around the
/// fused risk, clamped to [0.5, 0.99]. 0.5 when no module contributed.
pub fn variance_confidence(contributing: &[f64], risk_score: f64) -> f64 {
    if contributing.is_empty() {
        return 0.5;
    }
    let variance = contributing
        .iter()
        .map(|s| (s - risk_score).powi(2))
        .sum::<f64>()
        / contributing.len() as f64;
    (1.0 - variance).clamp(0.5, 0.99)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> AHashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn weighted_average_ignores_null_scores() {
        let scores = vec![
            ("text_extraction".to_string(), Some(0.8)),
            ("hidden_text".to_string(), None),
            ("frequency_analysis".to_string(), Some(0.2)),
        ];
        let w = weights(&[("text_extraction", 2.0), ("hidden_text", 1.5), ("frequency_analysis", 1.0)]);
        let risk = weighted_average(&scores, &w);
        assert!((risk - (2.0 * 0.8 + 1.0 * 0.2) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_average_is_zero_with_no_contributors() {
        let scores = vec![("text_extraction".to_string(), None)];
        assert_eq!(weighted_average(&scores, &weights(&[])), 0.0);
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let scores = vec![("structural".to_string(), Some(0.6))];
        assert!((weighted_average(&scores, &weights(&[])) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn ladder_is_monotone() {
        let ladder = ThresholdLadder {
            safe: 0.4,
            suspicious: 0.6,
            dangerous: 0.8,
        };
        let mut previous = Classification::Safe;
        for step in 0..=100 {
            let risk = step as f64 / 100.0;
            let current = classify_tiered(risk, &ladder);
            let rank = |c: Classification| match c {
                Classification::Safe => 0,
                Classification::Suspicious => 1,
                Classification::Dangerous => 2,
            };
            assert!(rank(current) >= rank(previous), "ladder regressed at {risk}");
            previous = current;
        }
    }

    #[test]
    fn ladder_has_a_safe_floor() {
        let ladder = ThresholdLadder {
            safe: 0.3,
            suspicious: 0.6,
            dangerous: 0.8,
        };
        assert_eq!(classify_tiered(0.2, &ladder), Classification::Safe);
        // Between safe and suspicious: never SAFE again.
        assert_eq!(classify_tiered(0.45, &ladder), Classification::Suspicious);
        assert_eq!(classify_tiered(0.7, &ladder), Classification::Suspicious);
        assert_eq!(classify_tiered(0.8, &ladder), Classification::Dangerous);
    }

    #[test]
    fn override_is_binary() {
        assert_eq!(classify_override(0.89, 0.9), Classification::Safe);
        assert_eq!(classify_override(0.9, 0.9), Classification::Dangerous);
    }

    #[test]
    fn confidence_bounds_and_fallback() {
        assert_eq!(variance_confidence(&[], 0.0), 0.5);
        // Perfect agreement maxes out at 0.99.
        assert_eq!(variance_confidence(&[0.5, 0.5], 0.5), 0.99);
        // Wild disagreement floors at 0.5.
        let spread = variance_confidence(&[0.0, 1.0], 0.5);
        assert!((0.5..=0.99).contains(&spread));
        assert!(spread < 0.99);
    }
}

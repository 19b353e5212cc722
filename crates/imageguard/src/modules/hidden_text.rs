//! Hidden-text module: CLAHE enhancement, multi-threshold binarization,
//! per-channel OCR and an edge-density flag.
//!
//! Text is "hidden" when a thresholded or single-channel pass recovers it
//! but the baseline full-color OCR does not.

use crate::core::config::HiddenTextConfig;
use crate::error::Result;
use crate::modules::{DetectionModule, ModuleContext, ModuleOutcome};
use crate::ocr::PageSegMode;
use crate::preprocess::PreparedImage;
use crate::vision::{self, clahe::clahe};
use image::{DynamicImage, GrayImage};
use serde_json::json;

const HIDDEN_TEXT_WEIGHT: f64 = 0.25;
const PATTERN_MATCH_WEIGHT: f64 = 0.15;
const EDGE_CELL_WEIGHT: f64 = 0.02;
const EDGE_SCORE_CAP: f64 = 0.10;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_GRID: u32 = 8;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

pub struct HiddenTextModule {
    config: HiddenTextConfig,
}

impl HiddenTextModule {
    pub fn new(config: HiddenTextConfig) -> Self {
        Self { config }
    }

    /// Count grid cells whose Canny edge density exceeds the configured
    /// threshold. Dense local edges on an otherwise flat image are a common
    /// artifact of low-contrast text overlays.
    fn edge_density_flags(&self, enhanced: &GrayImage) -> u32 {
        let edges = imageproc::edges::canny(enhanced, CANNY_LOW, CANNY_HIGH);
        let (width, height) = edges.dimensions();
        let grid = self.config.edge_grid_size.max(1);
        let cell_w = width / grid;
        let cell_h = height / grid;
        if cell_w == 0 || cell_h == 0 {
            return 0;
        }

        let mut flagged = 0;
        for gy in 0..grid {
            for gx in 0..grid {
                let mut nonzero = 0u64;
                for y in gy * cell_h..(gy + 1) * cell_h {
                    for x in gx * cell_w..(gx + 1) * cell_w {
                        if edges.get_pixel(x, y)[0] != 0 {
                            nonzero += 1;
                        }
                    }
                }
                let density = nonzero as f64 / f64::from(cell_w * cell_h);
                if density > self.config.edge_density_threshold {
                    flagged += 1;
                }
            }
        }
        flagged
    }
}

impl DetectionModule for HiddenTextModule {
    fn id(&self) -> &'static str {
        "hidden_text"
    }

    fn run(&self, image: &PreparedImage, ctx: &ModuleContext<'_>) -> Result<ModuleOutcome> {
        let gray = vision::grayscale(&image.rgb);
        let enhanced = clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_GRID);

        // Baseline: what ordinary OCR already sees on the full-color image.
        let base_text = ctx
            .ocr
            .recognize(&image.to_dynamic(), ctx.languages, PageSegMode::Block)?
            .text
            .trim()
            .to_string();

        // Multi-threshold pass over the contrast-enhanced image.
        let mut threshold_texts: Vec<String> = Vec::new();
        let mut thresholds_tried: Vec<u8> = Vec::new();
        for &threshold in &self.config.contrast_thresholds {
            let binary = vision::binarize(&enhanced, threshold);
            let output = ctx.ocr.recognize(
                &DynamicImage::ImageLuma8(binary),
                ctx.languages,
                PageSegMode::Sparse,
            )?;
            let trimmed = output.text.trim();
            if !trimmed.is_empty() {
                threshold_texts.push(trimmed.to_string());
                thresholds_tried.push(threshold);
            }
        }

        // Per-channel pass: text drawn into a single channel vanishes in the
        // luma conversion but survives channel isolation.
        let mut channel_texts: Vec<String> = Vec::new();
        let mut channels_used: Vec<&'static str> = Vec::new();
        let channels = vision::split_channels(&image.rgb);
        for (name, channel) in ["r", "g", "b"].into_iter().zip(channels) {
            let output = ctx.ocr.recognize(
                &DynamicImage::ImageLuma8(channel),
                ctx.languages,
                PageSegMode::Sparse,
            )?;
            let trimmed = output.text.trim();
            if !trimmed.is_empty() {
                channel_texts.push(trimmed.to_string());
                channels_used.push(name);
            }
        }

        let hidden_texts: Vec<&String> = threshold_texts
            .iter()
            .chain(channel_texts.iter())
            .filter(|text| !base_text.contains(text.as_str()))
            .collect();
        let combined = hidden_texts
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let match_target = if combined.is_empty() { &base_text } else { &combined };
        let matched: Vec<String> = ctx
            .patterns
            .find_matches(match_target)
            .into_iter()
            .map(|p| p.id.clone())
            .collect();

        let flagged_cells = self.edge_density_flags(&enhanced);

        let mut score = 0.0;
        if !combined.is_empty() {
            score += HIDDEN_TEXT_WEIGHT;
        }
        score += PATTERN_MATCH_WEIGHT * matched.len() as f64;
        score += (EDGE_CELL_WEIGHT * f64::from(flagged_cells)).min(EDGE_SCORE_CAP);
        let score = score.min(1.0);

        let details = json!({
            "text_found": !combined.is_empty(),
            "extracted_text": combined,
            "patterns_matched": matched,
            "thresholds_tried": thresholds_tried,
            "channels_used": channels_used,
            "edge_cells_flagged": flagged_cells,
        });

        Ok(ModuleOutcome { score, details })
    }
}

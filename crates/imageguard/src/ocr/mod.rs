//! OCR engine capability.
//!
//! Text-bearing modules consume OCR through the [`OcrEngine`] trait so the
//! engine can be swapped (or scripted in tests) without touching module
//! logic. The bundled implementation shells out to the `tesseract`
//! executable; see [`tesseract_cli`].

pub mod tesseract_cli;

pub use self::tesseract_cli::TesseractCliEngine;

use crate::error::Result;
use image::DynamicImage;

/// Page-segmentation hint forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegMode {
    /// A uniform block of text (tesseract PSM 6).
    Block,
    /// Sparse text in no particular order (tesseract PSM 11).
    Sparse,
    /// A single text line (tesseract PSM 7).
    SingleLine,
}

impl PageSegMode {
    /// Numeric tesseract PSM value.
    pub fn as_psm(self) -> u8 {
        match self {
            PageSegMode::Block => 6,
            PageSegMode::Sparse => 11,
            PageSegMode::SingleLine => 7,
        }
    }
}

/// Extracted text plus the engine-reported mean word confidence.
#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub text: String,
    /// Mean of non-negative per-word confidences in [0, 100]; 0.0 when the
    /// engine reports none.
    pub mean_confidence: f64,
}

/// An OCR engine handle shared read-only across modules and requests.
///
/// Implementations must be safe to call from multiple requests concurrently;
/// the pipeline itself invokes the engine sequentially within one request.
pub trait OcrEngine: Send + Sync {
    /// Recognize text in `image` using the given languages and segmentation
    /// hint.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Ocr` when the engine cannot be invoked or
    /// produces unusable output. Module-level policy (fail-open/closed)
    /// decides what happens next.
    fn recognize(&self, image: &DynamicImage, languages: &[String], psm: PageSegMode) -> Result<OcrOutput>;
}

//! Tiered risk classification of still images for prompt-injection payloads.
//!
//! An [`ImageGuard`] analyzer preprocesses an image (validation, EXIF
//! orientation, RGB normalization, bounded resize), runs a configurable set
//! of detection modules under per-module soft deadlines with a
//! fail-open/fail-closed policy, fuses their scores into a weighted risk,
//! classifies the result against a tiered threshold ladder and reports a
//! calibrated confidence.
//!
//! The five detection modules:
//!
//! * `text_extraction`: visible-text OCR, injection-pattern matching, text
//!   density, imperative phrasing, and de-obfuscation (homoglyphs,
//!   leetspeak, ROT13)
//! * `hidden_text`: CLAHE plus multi-threshold and per-channel OCR for
//!   low-contrast or single-channel text, with an edge-density flag
//! * `frequency_analysis`: FFT/DCT/wavelet energy ratios with an optional
//!   fitted baseline
//! * `steganography`: LSB randomness, chi-square, RS and optional SPA
//!   statistics
//! * `structural`: QR/barcode decoding with payload analysis, screenshot
//!   and text-overlay heuristics
//!
//! # Example
//!
//! ```rust,no_run
//! use imageguard::{AnalyzeOptions, Config, ImageGuard};
//!
//! # fn main() -> imageguard::Result<()> {
//! let guard = ImageGuard::builder()
//!     .config(Config::default())
//!     .modules(["text", "stego"])
//!     .build()?;
//! let report = guard.analyze_sync("meme.png".as_ref(), &AnalyzeOptions::default())?;
//! println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod modules;
pub mod ocr;
pub mod patterns;
pub mod preprocess;
pub mod signal;
pub mod text;
pub mod types;
pub mod vision;

pub use crate::core::config::Config;
pub use crate::core::orchestrator::{AnalyzeOptions, GuardBuilder, ImageGuard};
pub use crate::error::{GuardError, Result};
pub use crate::types::{
    AnalysisReport, Classification, ConfidenceMethod, ModuleResult, ModuleStatus, ThresholdLadder,
};

//! Tesseract CLI adapter.
//!
//! Invokes the `tesseract` executable once for plain text and once (best
//! effort) for TSV word confidences. The binary path defaults to `tesseract`
//! on PATH and can be overridden via `modules.text_extraction.tesseract_cmd`.

use crate::error::{GuardError, Result};
use crate::ocr::{OcrEngine, OcrOutput, PageSegMode};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;

/// OCR engine backed by the tesseract command-line tool.
pub struct TesseractCliEngine {
    command: PathBuf,
}

impl TesseractCliEngine {
    /// Engine using `tesseract` from PATH.
    pub fn new() -> Self {
        Self {
            command: PathBuf::from("tesseract"),
        }
    }

    /// Engine using an explicit executable path.
    pub fn with_command(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Whether the configured executable responds to `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn run(&self, input: &Path, languages: &[String], psm: PageSegMode, tsv: bool) -> Result<String> {
        let lang = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        let mut cmd = Command::new(&self.command);
        cmd.arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&lang)
            .arg("--psm")
            .arg(psm.as_psm().to_string());
        if tsv {
            cmd.arg("tsv");
        }
        let output = cmd.output().map_err(|e| GuardError::Ocr {
            message: format!("failed to invoke {}: {e}", self.command.display()),
            source: Some(Box::new(e)),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GuardError::ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Mean of the non-negative `conf` column of a tesseract TSV document.
    fn mean_confidence_from_tsv(tsv: &str) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for line in tsv.lines().skip(1) {
            let Some(conf_field) = line.split('\t').nth(10) else {
                continue;
            };
            let Ok(conf) = conf_field.trim().parse::<f64>() else {
                continue;
            };
            if conf >= 0.0 {
                sum += conf;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

impl Default for TesseractCliEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractCliEngine {
    fn recognize(&self, image: &DynamicImage, languages: &[String], psm: PageSegMode) -> Result<OcrOutput> {
        // Tesseract reads from disk; hand it a scoped temp PNG.
        let tmp = tempfile::Builder::new()
            .prefix("imageguard-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| GuardError::Ocr {
                message: format!("failed to create temp image for OCR: {e}"),
                source: Some(Box::new(e)),
            })?;
        image
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .map_err(|e| GuardError::Ocr {
                message: format!("failed to write temp image for OCR: {e}"),
                source: Some(Box::new(e)),
            })?;

        let text = self.run(tmp.path(), languages, psm, false)?;

        // Confidence is best effort; a failed TSV pass degrades to 0.0
        // rather than failing the module.
        let mean_confidence = match self.run(tmp.path(), languages, psm, true) {
            Ok(tsv) => Self::mean_confidence_from_tsv(&tsv),
            Err(e) => {
                tracing::debug!(error = %e, "tesseract TSV pass failed, reporting zero confidence");
                0.0
            }
        };

        Ok(OcrOutput { text, mean_confidence })
    }
}

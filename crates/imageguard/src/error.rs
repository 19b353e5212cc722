//! Error types for the analysis pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Errors surfaced by the analysis pipeline.
///
/// Only `NotFound`, `InvalidImage` and `Config` escape to callers of
/// [`crate::ImageGuard::analyze_sync`]; the remaining variants describe module
/// faults and are absorbed by the orchestrator's fail-open/fail-closed policy.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The input path does not exist.
    #[error("Image not found: {path}")]
    NotFound { path: PathBuf },

    /// Preprocessing rejected the input (directory, size, dimensions,
    /// animation, decode failure or magic-byte mismatch).
    #[error("{message}")]
    InvalidImage { message: String },

    /// Unknown module identifier or malformed option.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The OCR engine could not be invoked or produced unusable output.
    #[error("OCR failure: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A detection module failed mid-analysis.
    #[error("{module} analysis failed: {message}")]
    Analysis { module: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// Create an `InvalidImage` error from any displayable message.
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Create a `Config` error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an `Ocr` error without an underlying source.
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr {
            message: message.into(),
            source: None,
        }
    }

    /// Create an `Analysis` error attributed to a module.
    pub fn analysis(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            module: module.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_image_message_passes_through() {
        let err = GuardError::invalid_image("Image dimensions exceed allowed maximum");
        assert_eq!(err.to_string(), "Image dimensions exceed allowed maximum");
    }

    #[test]
    fn analysis_error_names_the_module() {
        let err = GuardError::analysis("steganography", "grayscale buffer empty");
        assert!(err.to_string().contains("steganography"));
    }
}

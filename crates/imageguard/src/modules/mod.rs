//! Detection modules.
//!
//! The five detectors share one capability: `(image, shared context) ->
//! outcome`. The orchestrator is generic over this trait and never inspects
//! module internals; modules never observe each other's outputs.

pub mod frequency;
pub mod hidden_text;
pub mod steganography;
pub mod structural;
pub mod text_extraction;

pub use self::frequency::FrequencyModule;
pub use self::hidden_text::HiddenTextModule;
pub use self::steganography::SteganographyModule;
pub use self::structural::{BarcodeDecoder, DecodedBarcode, StructuralModule};
pub use self::text_extraction::TextExtractionModule;

use crate::error::{GuardError, Result};
use crate::ocr::OcrEngine;
use crate::patterns::PatternStore;
use crate::preprocess::PreparedImage;

/// Score and details produced by one module run.
#[derive(Debug, Clone)]
pub struct ModuleOutcome {
    /// Risk contribution in [0, 1].
    pub score: f64,
    /// Module-specific findings, embedded verbatim in the result envelope.
    pub details: serde_json::Value,
}

/// Shared read-only state passed to every module invocation.
///
/// Nothing here is mutable; modules allocate any scratch buffers locally.
pub struct ModuleContext<'a> {
    pub patterns: &'a PatternStore,
    pub ocr: &'a dyn OcrEngine,
    pub languages: &'a [String],
    /// Whether extracted text is included in details.
    pub include_text: bool,
    /// Truncation limit for included text.
    pub max_text_length: usize,
}

impl ModuleContext<'_> {
    /// Text as it should appear in details: empty when inclusion is off,
    /// truncated with an ellipsis when over the limit.
    pub fn display_text(&self, text: &str) -> String {
        if !self.include_text {
            return String::new();
        }
        let trimmed = text.trim();
        if self.max_text_length > 0 && trimmed.chars().count() > self.max_text_length {
            let truncated: String = trimmed.chars().take(self.max_text_length).collect();
            format!("{truncated}...")
        } else {
            trimmed.to_string()
        }
    }
}

/// A detection module: pure function of the prepared image and the shared
/// context, identified by its canonical id.
pub trait DetectionModule: Send + Sync {
    /// Canonical module id (e.g. `"text_extraction"`).
    fn id(&self) -> &'static str;

    /// Analyze the image. Errors are absorbed by the orchestrator according
    /// to the fail-open/fail-closed policy.
    fn run(&self, image: &PreparedImage, ctx: &ModuleContext<'_>) -> Result<ModuleOutcome>;
}

/// Resolve a caller-supplied module name to its canonical id.
///
/// Accepts canonical ids and the documented short aliases. `all` is handled
/// by the orchestrator before this point.
pub fn resolve_module_id(name: &str) -> Option<&'static str> {
    match name {
        "text" | "text_extraction" => Some("text_extraction"),
        "hidden" | "hidden_text" => Some("hidden_text"),
        "frequency" | "frequency_analysis" => Some("frequency_analysis"),
        "stego" | "steganography" => Some("steganography"),
        "struct" | "structural" => Some("structural"),
        _ => None,
    }
}

/// Resolve a full caller-supplied module list, expanding `all` to the
/// configured enabled set and rejecting unknown names.
pub fn resolve_module_list(requested: &[String], enabled_in_config: &[&'static str]) -> Result<Vec<&'static str>> {
    let mut resolved: Vec<&'static str> = Vec::new();
    for name in requested {
        if name == "all" {
            for id in enabled_in_config {
                if !resolved.contains(id) {
                    resolved.push(id);
                }
            }
            continue;
        }
        match resolve_module_id(name) {
            Some(id) => {
                if !resolved.contains(&id) {
                    resolved.push(id);
                }
            }
            None => {
                return Err(GuardError::config(format!(
                    "Unsupported module requested: '{name}'. Supported: frequency_analysis, hidden_text, steganography, structural, text_extraction (aliases: text, hidden, frequency, stego, struct, all)"
                )));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_ids() {
        assert_eq!(resolve_module_id("text"), Some("text_extraction"));
        assert_eq!(resolve_module_id("hidden"), Some("hidden_text"));
        assert_eq!(resolve_module_id("frequency"), Some("frequency_analysis"));
        assert_eq!(resolve_module_id("stego"), Some("steganography"));
        assert_eq!(resolve_module_id("struct"), Some("structural"));
        assert_eq!(resolve_module_id("structural"), Some("structural"));
        assert_eq!(resolve_module_id("ocr"), None);
    }

    #[test]
    fn all_expands_to_enabled_set() {
        let enabled = ["text_extraction", "steganography"];
        let resolved = resolve_module_list(&["all".to_string()], &enabled).unwrap();
        assert_eq!(resolved, vec!["text_extraction", "steganography"]);
    }

    #[test]
    fn duplicates_are_collapsed() {
        let resolved =
            resolve_module_list(&["text".to_string(), "text_extraction".to_string()], &[]).unwrap();
        assert_eq!(resolved, vec!["text_extraction"]);
    }

    #[test]
    fn unknown_module_is_config_error() {
        let err = resolve_module_list(&["telepathy".to_string()], &[]).unwrap_err();
        assert!(matches!(err, GuardError::Config { .. }));
        assert!(err.to_string().contains("telepathy"));
    }

    #[test]
    fn display_text_respects_inclusion_and_limit() {
        let patterns = PatternStore::default_set();
        struct NoOcr;
        impl crate::ocr::OcrEngine for NoOcr {
            fn recognize(
                &self,
                _: &image::DynamicImage,
                _: &[String],
                _: crate::ocr::PageSegMode,
            ) -> Result<crate::ocr::OcrOutput> {
                Err(GuardError::ocr("unused"))
            }
        }
        let ocr = NoOcr;
        let languages = vec!["eng".to_string()];
        let ctx = ModuleContext {
            patterns: &patterns,
            ocr: &ocr,
            languages: &languages,
            include_text: true,
            max_text_length: 5,
        };
        assert_eq!(ctx.display_text("  hello world  "), "hello...");

        let hidden = ModuleContext { include_text: false, ..ctx };
        assert_eq!(hidden.display_text("hello"), "");
    }
}

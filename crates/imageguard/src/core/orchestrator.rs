//! The analysis orchestrator.
//!
//! Owns the per-request pipeline: preprocess, run each enabled module under
//! a soft deadline, fuse scores, classify and assemble the result envelope.
//! The orchestrator is the only timing and failure-policy authority; modules
//! never see each other.

use crate::core::calibration::{self, PlattParameters};
use crate::core::config::Config;
use crate::core::fusion;
use crate::error::{GuardError, Result};
use crate::modules::{
    resolve_module_list, BarcodeDecoder, DetectionModule, FrequencyModule, HiddenTextModule, ModuleContext,
    SteganographyModule, StructuralModule, TextExtractionModule,
};
use crate::ocr::{OcrEngine, TesseractCliEngine};
use crate::patterns::PatternStore;
use crate::preprocess::{self, PreparedImage};
use crate::types::{
    AnalysisReport, Classification, ConfidenceMethod, ImageInfo, ModuleResult, ModuleStatus, ResultSummary,
    ThresholdLadder,
};
use ahash::AHashMap;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Write the normalized image to a temp PNG and report its path.
    pub return_marked: bool,
    /// Override `output.include_extracted_text` for this request.
    pub include_text: Option<bool>,
    /// Override `output.max_text_length` for this request.
    pub max_text_length: Option<usize>,
}

struct Inner {
    config: Config,
    weights: AHashMap<String, f64>,
    threshold_override: Option<f64>,
    languages: Vec<String>,
    patterns: PatternStore,
    calibration: Option<PlattParameters>,
    ocr: Arc<dyn OcrEngine>,
    modules: Vec<Box<dyn DetectionModule>>,
}

/// Image analyzer: immutable after construction, cheap to clone, safe to
/// share across threads for parallel independent requests.
///
/// # Example
///
/// ```rust,no_run
/// use imageguard::{AnalyzeOptions, ImageGuard};
///
/// # fn main() -> imageguard::Result<()> {
/// let guard = ImageGuard::builder().build()?;
/// let report = guard.analyze_sync("suspect.png".as_ref(), &AnalyzeOptions::default())?;
/// println!("{:?} at risk {:.2}", report.result.classification, report.result.risk_score);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ImageGuard {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ImageGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageGuard").finish_non_exhaustive()
    }
}

/// Builder for [`ImageGuard`].
#[derive(Default)]
pub struct GuardBuilder {
    modules: Option<Vec<String>>,
    threshold: Option<f64>,
    weights: Option<AHashMap<String, f64>>,
    languages: Option<Vec<String>>,
    config: Option<Config>,
    ocr: Option<Arc<dyn OcrEngine>>,
    barcode_decoder: Option<Arc<dyn BarcodeDecoder>>,
}

impl GuardBuilder {
    /// Restrict analysis to the given modules. Accepts canonical ids, the
    /// short aliases, and `all` for the configured enabled set.
    pub fn modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the tiered ladder with a single DANGEROUS/SAFE threshold.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Override fusion weights per module id.
    pub fn weights<I, S>(mut self, weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.weights = Some(weights.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    /// OCR languages, overriding `modules.text_extraction.languages`.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    /// Use an explicit configuration instead of [`Config::default`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Inject an OCR engine (tests use a scripted engine here).
    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Inject a 1D barcode decoder; absent by default.
    pub fn barcode_decoder(mut self, decoder: Arc<dyn BarcodeDecoder>) -> Self {
        self.barcode_decoder = Some(decoder);
        self
    }

    /// Validate the module selection and assemble the analyzer.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` for unknown module names.
    pub fn build(self) -> Result<ImageGuard> {
        let config = self.config.unwrap_or_default();

        let enabled_in_config = config.modules.enabled_ids();
        let enabled = match &self.modules {
            Some(requested) => resolve_module_list(requested, &enabled_in_config)?,
            None => enabled_in_config,
        };

        let mut weights: AHashMap<String, f64> = crate::core::config::MODULE_IDS
            .iter()
            .map(|id| (id.to_string(), config.modules.weight_of(id)))
            .collect();
        if let Some(overrides) = self.weights {
            weights.extend(overrides);
        }

        let languages = self
            .languages
            .unwrap_or_else(|| config.modules.text_extraction.languages.clone());

        let patterns = PatternStore::load(config.modules.text_extraction.pattern_path.as_deref());

        let calibration = config.scoring.calibration_data.as_ref().and_then(|path| {
            match calibration::load_calibration(path) {
                Ok(params) => Some(params),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "confidence calibration unavailable");
                    None
                }
            }
        });

        let ocr: Arc<dyn OcrEngine> = match self.ocr {
            Some(engine) => engine,
            None => match &config.modules.text_extraction.tesseract_cmd {
                Some(cmd) => Arc::new(TesseractCliEngine::with_command(cmd.clone())),
                None => Arc::new(TesseractCliEngine::new()),
            },
        };

        // Instantiate in canonical order so the run order (and therefore the
        // result envelope) is deterministic regardless of request order.
        let mut modules: Vec<Box<dyn DetectionModule>> = Vec::new();
        for id in crate::core::config::MODULE_IDS {
            if !enabled.contains(&id) {
                continue;
            }
            match id {
                "text_extraction" => {
                    modules.push(Box::new(TextExtractionModule::new(config.modules.text_extraction.clone())));
                }
                "hidden_text" => {
                    modules.push(Box::new(HiddenTextModule::new(config.modules.hidden_text.clone())));
                }
                "frequency_analysis" => {
                    modules.push(Box::new(FrequencyModule::new(config.modules.frequency_analysis.clone())));
                }
                "steganography" => {
                    modules.push(Box::new(SteganographyModule::new(config.modules.steganography.clone())));
                }
                "structural" => {
                    modules.push(Box::new(StructuralModule::new(
                        config.modules.structural.clone(),
                        self.barcode_decoder.clone(),
                    )));
                }
                _ => unreachable!("MODULE_IDS is exhaustive"),
            }
        }

        Ok(ImageGuard {
            inner: Arc::new(Inner {
                config,
                weights,
                threshold_override: self.threshold,
                languages,
                patterns,
                calibration,
                ocr,
                modules,
            }),
        })
    }
}

impl ImageGuard {
    /// Start building an analyzer.
    pub fn builder() -> GuardBuilder {
        GuardBuilder::default()
    }

    /// Analyzer with the default configuration and the tesseract CLI engine.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The effective configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Analyze a single image, blocking the current thread.
    ///
    /// # Errors
    ///
    /// Propagates `GuardError::NotFound` and `GuardError::InvalidImage` from
    /// preprocessing. Module faults never propagate: under fail-open they
    /// yield null-score entries, under fail-closed the canonical fail-closed
    /// envelope is returned as a normal result.
    pub fn analyze_sync(&self, image_path: &Path, options: &AnalyzeOptions) -> Result<AnalysisReport> {
        let inner = &self.inner;
        let started = Instant::now();

        let prepared = preprocess::load_image(image_path, &inner.config.general)?;
        tracing::debug!(
            filename = %prepared.info.filename,
            width = prepared.info.normalized_dimensions.width,
            height = prepared.info.normalized_dimensions.height,
            "image normalized"
        );

        let ctx = ModuleContext {
            patterns: &inner.patterns,
            ocr: inner.ocr.as_ref(),
            languages: &inner.languages,
            include_text: options
                .include_text
                .unwrap_or(inner.config.output.include_extracted_text),
            max_text_length: options.max_text_length.unwrap_or(inner.config.output.max_text_length),
        };

        let timeout = inner.config.general.timeout_seconds as f64;
        let fail_open = inner.config.general.fail_open;

        let mut module_scores: IndexMap<String, ModuleResult> = IndexMap::new();
        for module in &inner.modules {
            let id = module.id();
            tracing::debug!(module = id, "running detection module");
            let module_started = Instant::now();
            let outcome = module.run(&prepared, &ctx);
            let elapsed = module_started.elapsed();

            let entry = match outcome {
                Err(e) => {
                    if !fail_open {
                        return Ok(self.fail_closed_report(&prepared.info, e.to_string(), started));
                    }
                    tracing::warn!(module = id, error = %e, "module failed, continuing fail-open");
                    ModuleResult::degraded(ModuleStatus::Error, e.to_string())
                }
                Ok(outcome) => {
                    if elapsed.as_secs_f64() > timeout {
                        if !fail_open {
                            return Ok(self.fail_closed_report(&prepared.info, format!("{id} timeout"), started));
                        }
                        ModuleResult::degraded(ModuleStatus::Timeout, format!("{id} exceeded timeout"))
                    } else {
                        ModuleResult::ok(outcome.score, elapsed.as_millis() as u64, outcome.details)
                    }
                }
            };
            module_scores.insert(id.to_string(), entry);
        }

        let scores: Vec<(String, Option<f64>)> = module_scores
            .iter()
            .map(|(id, result)| (id.clone(), result.score))
            .collect();
        let risk_score = fusion::weighted_average(&scores, &inner.weights);

        let configured = inner.config.scoring.thresholds;
        let (classification, threshold_used) = match inner.threshold_override {
            Some(threshold) => (
                fusion::classify_override(risk_score, threshold),
                ThresholdLadder::uniform(threshold),
            ),
            None => (fusion::classify_tiered(risk_score, &configured), configured),
        };

        let contributing: Vec<f64> = scores.iter().filter_map(|(_, s)| *s).collect();
        let confidence_raw = fusion::variance_confidence(&contributing, risk_score);
        let (confidence, confidence_method) = match &inner.calibration {
            Some(params) => (calibration::platt_confidence(risk_score, params), ConfidenceMethod::PlattScaling),
            None => (confidence_raw, ConfidenceMethod::Variance),
        };

        let marked_image_path = if options.return_marked {
            Some(self.write_marked_image(&prepared)?)
        } else {
            None
        };

        Ok(AnalysisReport {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            image_info: prepared.info,
            result: ResultSummary {
                classification,
                risk_score,
                confidence,
                confidence_raw,
                confidence_method,
                threshold_used,
                thresholds: configured,
            },
            module_scores,
            marked_image_path,
        })
    }

    /// Analyze a single image on the blocking thread pool.
    ///
    /// Thin async facade over [`Self::analyze_sync`]; the pipeline itself is
    /// CPU- and subprocess-bound.
    #[cfg(feature = "tokio-runtime")]
    pub async fn analyze(&self, image_path: impl AsRef<Path>, options: &AnalyzeOptions) -> Result<AnalysisReport> {
        let guard = self.clone();
        let path = image_path.as_ref().to_path_buf();
        let options = options.clone();
        tokio::task::spawn_blocking(move || guard.analyze_sync(&path, &options))
            .await
            .map_err(|e| GuardError::analysis("orchestrator", format!("analysis task panicked: {e}")))?
    }

    /// The canonical fail-closed envelope: DANGEROUS at full risk and full
    /// confidence, with one synthetic error module entry.
    fn fail_closed_report(&self, info: &ImageInfo, message: String, started: Instant) -> AnalysisReport {
        let configured = self.inner.config.scoring.thresholds;
        let threshold_used = match self.inner.threshold_override {
            Some(threshold) => ThresholdLadder::uniform(threshold),
            None => configured,
        };
        let mut module_scores = IndexMap::new();
        module_scores.insert(
            "error".to_string(),
            ModuleResult {
                score: Some(1.0),
                status: ModuleStatus::Error,
                latency_ms: None,
                details: serde_json::json!({ "message": message }),
            },
        );
        AnalysisReport {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            image_info: info.clone(),
            result: ResultSummary {
                classification: Classification::Dangerous,
                risk_score: 1.0,
                confidence: 1.0,
                confidence_raw: 1.0,
                confidence_method: ConfidenceMethod::Variance,
                threshold_used,
                thresholds: configured,
            },
            module_scores,
            marked_image_path: None,
        }
    }

    /// Persist the normalized image for human review and return its path.
    fn write_marked_image(&self, prepared: &PreparedImage) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("imageguard-marked-")
            .suffix(".png")
            .tempfile()?;
        prepared
            .rgb
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| GuardError::analysis("orchestrator", format!("failed to write marked image: {e}")))?;
        let (_, path) = file
            .keep()
            .map_err(|e| GuardError::analysis("orchestrator", format!("failed to persist marked image: {e}")))?;
        Ok(path.display().to_string())
    }
}

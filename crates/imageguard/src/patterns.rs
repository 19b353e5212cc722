//! Injection-pattern definitions and matching.
//!
//! The default set targets the common shapes of visual prompt injection:
//! instruction-override phrasing, role manipulation, system-prompt markers,
//! jailbreak vocabulary, long base64-like runs and output-steering
//! imperatives. Custom sets can be loaded from a YAML file and fall back to
//! the defaults when the file is missing or malformed.

use crate::error::{GuardError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// A single detector: a case-insensitive regex, a lowercase keyword list, or
/// both. The pattern matches when the regex hits or any keyword appears as a
/// substring of the lowercased input.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: String,
    regex: Option<Regex>,
    keywords: Vec<String>,
    /// Advisory severity in [0, 1]. Scoring currently treats all matches
    /// uniformly; the field is carried for reporting and downstream tuning.
    pub severity: f64,
}

impl Pattern {
    /// Compile a pattern from its parts.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` when the regex does not compile.
    pub fn new(id: impl Into<String>, regex: Option<&str>, keywords: &[&str], severity: f64) -> Result<Self> {
        let id = id.into();
        let regex = match regex {
            Some(source) => Some(
                RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| GuardError::config(format!("pattern '{id}': invalid regex: {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            id,
            regex,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            severity,
        })
    }

    /// Whether this pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        if let Some(re) = &self.regex {
            if re.is_match(text) {
                return true;
            }
        }
        if self.keywords.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k))
    }
}

/// Entry shape of a YAML pattern override file.
#[derive(Debug, Deserialize)]
struct PatternEntry {
    id: String,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_severity")]
    severity: f64,
}

fn default_severity() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

/// Immutable, compiled pattern set shared read-only across requests.
#[derive(Debug, Clone)]
pub struct PatternStore {
    patterns: Arc<Vec<Pattern>>,
}

impl PatternStore {
    /// The built-in detector set.
    pub fn default_set() -> Self {
        let patterns = vec![
            Pattern::new(
                "ignore_instructions",
                Some(r"(ignore|disregard|forget)\s+(all\s+)?(previous|prior|above|your)\s+(instructions?|prompts?|rules?)"),
                &[],
                0.9,
            ),
            Pattern::new(
                "role_manipulation",
                Some(r"(you\s+are\s+now|pretend\s+(to\s+be|you\s+are)|act\s+as|your\s+new\s+role)"),
                &[],
                0.85,
            ),
            Pattern::new(
                "system_prompt_reference",
                Some(r"(system\s+prompt|end\s+of\s+(system|instructions)|<\|system\|>|\[INST\])"),
                &[],
                0.8,
            ),
            Pattern::new(
                "jailbreak_keywords",
                None,
                &["dan", "developer mode", "jailbreak", "no restrictions", "bypass", "unlock"],
                0.95,
            ),
            Pattern::new(
                "encoded_base64",
                Some(r"(?:[A-Za-z0-9+/]{4}){10,}(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?"),
                &[],
                0.7,
            ),
            Pattern::new(
                "output_manipulation",
                Some(r#"(just\s+)?(output|respond|reply|answer|say)\s+['"]?\w+['"]?"#),
                &[],
                0.85,
            ),
            Pattern::new(
                "conditional_injection",
                Some(r"when\s+(asked|prompted|questioned)\s+(about|for|regarding)"),
                &[],
                0.8,
            ),
            Pattern::new(
                "response_override",
                Some(r"(always|only|must)\s+(respond|output|say|reply)\s+(with|as)"),
                &[],
                0.9,
            ),
            Pattern::new(
                "task_hijacking",
                None,
                &["instead of", "rather than", "not the", "override", "replace with"],
                0.75,
            ),
            Pattern::new(
                "sorry_injection",
                Some(r#"(output|say|respond|reply)\s+['"]?sorry['"]?"#),
                &[],
                0.85,
            ),
        ];
        let patterns = patterns
            .into_iter()
            .collect::<Result<Vec<_>>>()
            .expect("built-in patterns are valid and should compile");
        Self {
            patterns: Arc::new(patterns),
        }
    }

    /// Load a pattern set from a YAML file, falling back to the defaults when
    /// the path is `None`, unreadable, malformed, or yields an empty list.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default_set();
        };
        match Self::try_load(path) {
            Ok(store) if !store.patterns.is_empty() => store,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "pattern file contained no patterns, using defaults");
                Self::default_set()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load pattern file, using defaults");
                Self::default_set()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: PatternFile =
            serde_yaml_ng::from_str(&raw).map_err(|e| GuardError::config(format!("invalid pattern file: {e}")))?;
        let patterns = file
            .patterns
            .into_iter()
            .map(|entry| {
                let keywords: Vec<&str> = entry.keywords.iter().map(String::as_str).collect();
                Pattern::new(entry.id, entry.regex.as_deref(), &keywords, entry.severity)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns: Arc::new(patterns),
        })
    }

    /// Patterns whose regex matches `text` or whose any keyword is a
    /// substring of the lowercased text, in definition order.
    pub fn find_matches(&self, text: &str) -> Vec<&Pattern> {
        self.patterns.iter().filter(|p| p.matches(text)).collect()
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when the store holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::default_set()
    }
}

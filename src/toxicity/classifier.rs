// ToxicityClassifier: normalize, score, label.
//
// Wraps an optional scoring oracle. Without one (the model failed to load)
// every call answers Unknown. Oracle errors become the Error label for that
// one text and are logged; nothing here ever returns Err to the caller.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::keyword::KeywordScorer;
use super::onnx::OnnxToxicityScorer;
use super::traits::ToxicityScorer;
use crate::config::{Config, ScorerBackend};
use crate::output::truncate_chars;
use crate::text::normalize;

/// Classifier output category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Toxic,
    NonToxic,
    /// The scoring oracle is unavailable.
    Unknown,
    /// Scoring this particular text failed.
    Error,
    /// No text to classify (batch rows only).
    Empty,
}

impl Label {
    pub const ALL: [Label; 5] = [
        Label::Toxic,
        Label::NonToxic,
        Label::Unknown,
        Label::Error,
        Label::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Toxic => "TOXIC",
            Label::NonToxic => "NON_TOXIC",
            Label::Unknown => "UNKNOWN",
            Label::Error => "ERROR",
            Label::Empty => "EMPTY",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown label: {s}"))
    }
}

/// A `(label, score)` pair. `score` is always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub score: f64,
}

impl Classification {
    pub fn new(label: Label, score: f64) -> Self {
        Self {
            label,
            score: clamp_score(score),
        }
    }

    pub fn non_toxic_empty() -> Self {
        Self::new(Label::NonToxic, 0.0)
    }

    pub fn is_toxic(&self) -> bool {
        self.label == Label::Toxic
    }
}

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// The classifier service. Cheap to clone; read-only after construction.
#[derive(Clone)]
pub struct ToxicityClassifier {
    scorer: Option<Arc<dyn ToxicityScorer>>,
    threshold: f64,
    max_tokens: usize,
}

impl ToxicityClassifier {
    pub fn new(scorer: Arc<dyn ToxicityScorer>) -> Self {
        Self {
            scorer: Some(scorer),
            threshold: DEFAULT_THRESHOLD,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// A classifier with no oracle. Every call answers `Unknown, 0.0`.
    pub fn unavailable() -> Self {
        Self {
            scorer: None,
            threshold: DEFAULT_THRESHOLD,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Build the backend named in the config. A backend that fails to load
    /// leaves the classifier unavailable instead of failing startup.
    pub fn from_config(config: &Config) -> Self {
        let classifier = match config.scorer_backend {
            ScorerBackend::Keyword => {
                info!("Using keyword scorer");
                Self::new(Arc::new(KeywordScorer::default()))
            }
            ScorerBackend::Onnx => {
                match OnnxToxicityScorer::load(&config.model_dir, config.max_tokens) {
                    Ok(scorer) => {
                        info!(dir = %config.model_dir.display(), "Using ONNX scorer");
                        Self::new(Arc::new(scorer))
                    }
                    Err(e) => {
                        warn!(error = %e, "Toxicity model unavailable, classifications will be UNKNOWN");
                        Self::unavailable()
                    }
                }
            }
        };
        classifier
            .with_threshold(config.toxic_threshold)
            .with_max_tokens(config.max_tokens)
    }

    pub fn is_available(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Normalize and classify `text`.
    pub async fn classify(&self, text: &str) -> Classification {
        if self.scorer.is_none() {
            return Classification::new(Label::Unknown, 0.0);
        }
        self.classify_normalized(&normalize(text)).await
    }

    /// Classify text that has already been through `normalize`.
    pub async fn classify_normalized(&self, cleaned: &str) -> Classification {
        let Some(scorer) = &self.scorer else {
            return Classification::new(Label::Unknown, 0.0);
        };
        if cleaned.trim().is_empty() {
            return Classification::non_toxic_empty();
        }

        let bounded = truncate_tokens(cleaned, self.max_tokens);
        match scorer.score_text(&bounded).await {
            Ok(result) if result.toxicity.is_finite() => {
                let score = clamp_score(result.toxicity);
                let label = if score >= self.threshold {
                    Label::Toxic
                } else {
                    Label::NonToxic
                };
                Classification::new(label, score)
            }
            Ok(result) => {
                warn!(
                    score = result.toxicity,
                    text_preview = %truncate_chars(cleaned, 50),
                    "Scorer returned a non-finite score"
                );
                Classification::new(Label::Error, 0.0)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    text_preview = %truncate_chars(cleaned, 50),
                    "Scoring failed"
                );
                Classification::new(Label::Error, 0.0)
            }
        }
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Keep at most `max_tokens` whitespace-separated tokens.
fn truncate_tokens(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

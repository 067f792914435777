// Toxicity scorer trait: the oracle seam.
//
// The classifier never talks to a model directly; it holds something that
// implements ToxicityScorer. The default implementation runs a local ONNX
// model; the keyword scorer stands in when no model is available.

use anyhow::Result;
use async_trait::async_trait;

/// The raw result of scoring a single piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToxicityResult {
    /// Overall toxicity probability from 0.0 (benign) to 1.0 (very toxic)
    pub toxicity: f64,
}

impl ToxicityResult {
    pub fn overall(toxicity: f64) -> Self {
        Self { toxicity }
    }
}

/// Trait for scoring text toxicity. Async because backends either call out
/// over the network or offload CPU-bound inference to a blocking thread.
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Score a single text for toxicity.
    async fn score_text(&self, text: &str) -> Result<ToxicityResult>;

    /// Score multiple texts, returning results in the same order.
    /// Default implementation calls score_text sequentially.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<ToxicityResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.score_text(text).await?);
        }
        Ok(results)
    }
}

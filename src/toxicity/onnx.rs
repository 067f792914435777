// Local ONNX toxicity scorer for BERT-style multi-label toxicity models.
//
// Runs entirely on the local CPU. Expects a BERT export of a Jigsaw-style
// classifier (toxic-bert and friends) taking input_ids, attention_mask and
// token_type_ids, with six sigmoid heads in the order toxic, severe_toxic,
// obscene, threat, insult, identity_hate.
//
// Inputs are truncated by the tokenizer at `max_tokens`, so overlong texts
// are scored on their prefix instead of failing.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, Tokenizer, TruncationParams};
use tracing::debug;

use super::traits::{ToxicityResult, ToxicityScorer};

/// Labels output by the model, in the order the model returns them.
pub const LABEL_ORDER: [&str; 6] = [
    "toxic",
    "severe_toxic",
    "obscene",
    "threat",
    "insult",
    "identity_hate",
];

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local ONNX-based toxicity scorer.
pub struct OnnxToxicityScorer {
    // ort::Session::run takes &mut self, and spawn_blocking needs 'static,
    // hence Arc<Mutex<_>>. Inference is serialized anyway.
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

/// Check whether both model files exist in `dir`.
pub fn model_files_present(dir: &Path) -> bool {
    dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

impl OnnxToxicityScorer {
    /// Load the ONNX model and tokenizer from `model_dir`.
    ///
    /// `max_tokens` bounds the sequence length handed to the model;
    /// longer inputs are truncated silently.
    pub fn load(model_dir: &Path, max_tokens: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        if !model_files_present(model_dir) {
            anyhow::bail!(
                "Model files not found in {} (need {MODEL_FILE} and {TOKENIZER_FILE}).\n\
                 Run `toxwatch download-model`, or set TOXWATCH_MODEL_DIR or TOXWATCH_SCORER=keyword.",
                model_dir.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        debug!(
            dir = %model_dir.display(),
            max_tokens,
            "Loaded ONNX toxicity model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl ToxicityScorer for OnnxToxicityScorer {
    async fn score_text(&self, text: &str) -> Result<ToxicityResult> {
        let mut results = self.score_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model returned no output rows"))
    }

    /// Tokenize all texts (padded to the longest), run one forward pass,
    /// and apply sigmoid to each logit. CPU-bound work runs in
    /// spawn_blocking so the runtime stays responsive.
    async fn score_batch(&self, texts: &[String]) -> Result<Vec<ToxicityResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let encodings = tokenizer
                .encode_batch(texts.iter().map(String::as_str).collect::<Vec<_>>(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

            let batch_size = encodings.len();
            let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
            let shape = [batch_size as i64, seq_len as i64];

            // Padding is BatchLongest, so every row already has seq_len ids
            let flatten = |field: fn(&Encoding) -> &[u32]| -> Vec<i64> {
                encodings
                    .iter()
                    .flat_map(|e| field(e).iter().map(|&v| v as i64))
                    .collect()
            };

            let input_ids = Tensor::from_array((shape, flatten(Encoding::get_ids)))
                .context("Failed to create input_ids tensor")?;
            let attention_mask = Tensor::from_array((shape, flatten(Encoding::get_attention_mask)))
                .context("Failed to create attention_mask tensor")?;
            let token_type_ids = Tensor::from_array((shape, flatten(Encoding::get_type_ids)))
                .context("Failed to create token_type_ids tensor")?;

            let logits = {
                let mut session = session
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

                let outputs = session
                    .run(ort::inputs! {
                        "input_ids" => input_ids,
                        "attention_mask" => attention_mask,
                        "token_type_ids" => token_type_ids
                    })
                    .context("ONNX inference failed")?;

                // Output shape: [batch_size, 6] raw logits
                let (_shape, data) = outputs[0]
                    .try_extract_tensor::<f32>()
                    .context("Failed to extract output tensor")?;
                data.to_vec()
            };

            if logits.len() != batch_size * LABEL_ORDER.len() {
                anyhow::bail!(
                    "Unexpected model output size {} for batch of {}",
                    logits.len(),
                    batch_size
                );
            }

            Ok(logits
                .chunks(LABEL_ORDER.len())
                .map(|row| {
                    let scores: Vec<f64> = row.iter().map(|&l| sigmoid(l as f64)).collect();
                    toxic_head(&scores)
                })
                .collect())
        })
        .await
        .context("spawn_blocking panicked")?
    }
}

/// Sigmoid activation: maps any real number to (0, 1).
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// The label decision only uses the `toxic` head (first in LABEL_ORDER).
fn toxic_head(scores: &[f64]) -> ToxicityResult {
    ToxicityResult::overall(scores.first().copied().unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_midpoint_and_tails() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn sigmoid_symmetry() {
        for x in [0.5, 1.0, 2.0, 5.0] {
            let sum = sigmoid(x) + sigmoid(-x);
            assert!((sum - 1.0).abs() < 1e-10, "sigmoid({x}) + sigmoid(-{x}) != 1");
        }
    }

    #[test]
    fn toxicity_comes_from_the_toxic_head() {
        let result = toxic_head(&[0.9, 0.1, 0.8, 0.05, 0.7, 0.3]);
        assert!((result.toxicity - 0.9).abs() < 1e-10);
        assert!(toxic_head(&[]).toxicity.is_nan());
    }

    #[test]
    fn load_fails_cleanly_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxToxicityScorer::load(dir.path(), 512).err().unwrap();
        assert!(err.to_string().contains("Model files not found"));
        assert!(err.to_string().contains("toxwatch download-model"));
        assert!(!model_files_present(dir.path()));
    }
}

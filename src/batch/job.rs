// Resumable batch scoring.
//
// Init: load the checkpoint, resume at its row count.
// Processing: classify the remaining inputs chunk by chunk, appending each
// finished chunk to the checkpoint before starting the next.
// Done: every input has a row; report per-label counts.
//
// Stopping early (shutdown signal or a chunk limit) is always at a chunk
// boundary, so the checkpoint is consistent and the next run picks up
// exactly where this one stopped.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info};

use super::checkpoint::{Checkpoint, CheckpointRow};
use crate::monitor::shutdown::ShutdownListener;
use crate::text::normalize;
use crate::toxicity::{Label, ToxicityClassifier};

/// Original and cleaned text are cut to this many characters in the output.
pub const MAX_STORED_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub chunk_size: usize,
    /// Pause after each chunk.
    pub chunk_pause: Duration,
    /// Stop after this many chunks in this run.
    pub max_chunks: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: 32,
            chunk_pause: Duration::from_millis(100),
            max_chunks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    /// Rows already in the checkpoint when this run started.
    pub resumed_from: usize,
    /// Rows processed by this run.
    pub processed: usize,
    /// Counts over the whole checkpoint, not just this run.
    pub label_counts: BTreeMap<Label, usize>,
    pub completed: bool,
}

pub struct BatchJob {
    classifier: ToxicityClassifier,
    options: BatchOptions,
    progress: ProgressBar,
    shutdown: Option<ShutdownListener>,
}

impl BatchJob {
    pub fn new(classifier: ToxicityClassifier, options: BatchOptions) -> Self {
        Self {
            classifier,
            options,
            progress: ProgressBar::hidden(),
            shutdown: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Stop at the next chunk boundary once shutdown is triggered.
    pub fn with_shutdown(mut self, shutdown: ShutdownListener) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Process `inputs` into `checkpoint`. A `None` input is a missing value.
    pub async fn run(
        &self,
        inputs: &[Option<String>],
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<BatchSummary> {
        let total_rows = inputs.len();
        let resumed_from = checkpoint.load()?;

        if resumed_from > total_rows {
            anyhow::bail!(
                "Checkpoint has {resumed_from} rows but the input only has {total_rows}; \
                 is this the right output file?"
            );
        }

        self.progress.set_length(total_rows as u64);
        self.progress.set_position(resumed_from as u64);

        if checkpoint.is_complete(total_rows) {
            info!(total_rows, "Checkpoint already covers every row, nothing to do");
            self.progress.finish_and_clear();
            return Ok(summary(checkpoint, total_rows, resumed_from, 0));
        }

        info!(total_rows, resumed_from, chunk_size = self.options.chunk_size, "Starting batch");

        let chunk_size = self.options.chunk_size.max(1);
        let mut processed = 0;
        let mut chunks_done = 0;

        for chunk in inputs[resumed_from..].chunks(chunk_size) {
            if self.stop_requested(chunks_done) {
                break;
            }

            let mut rows = Vec::with_capacity(chunk.len());
            for input in chunk {
                rows.push(self.process_row(input.as_deref()).await);
                self.progress.inc(1);
            }

            checkpoint.append_chunk(&rows)?;
            processed += rows.len();
            chunks_done += 1;
            debug!(rows = checkpoint.rows(), "Chunk saved");

            if !self.options.chunk_pause.is_zero() && !checkpoint.is_complete(total_rows) {
                tokio::time::sleep(self.options.chunk_pause).await;
            }
        }

        self.progress.finish_and_clear();
        let summary = summary(checkpoint, total_rows, resumed_from, processed);
        info!(
            processed = summary.processed,
            rows = checkpoint.rows(),
            completed = summary.completed,
            "Batch run finished"
        );
        Ok(summary)
    }

    fn stop_requested(&self, chunks_done: usize) -> bool {
        if let Some(max) = self.options.max_chunks {
            if chunks_done >= max {
                info!(max_chunks = max, "Chunk limit reached, stopping");
                return true;
            }
        }
        if let Some(shutdown) = &self.shutdown {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping at chunk boundary");
                return true;
            }
        }
        false
    }

    async fn process_row(&self, text: Option<&str>) -> CheckpointRow {
        let original = text.unwrap_or_default();
        let cleaned = if original.trim().is_empty() {
            String::new()
        } else {
            normalize(original)
        };

        let (label, score) = if cleaned.is_empty() {
            (Label::Empty, 0.0)
        } else {
            let result = self.classifier.classify_normalized(&cleaned).await;
            (result.label, result.score)
        };

        CheckpointRow {
            original_text: bounded(original),
            cleaned_text: bounded(&cleaned),
            label,
            score,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

fn bounded(text: &str) -> String {
    text.chars().take(MAX_STORED_CHARS).collect()
}

fn summary(
    checkpoint: &dyn Checkpoint,
    total_rows: usize,
    resumed_from: usize,
    processed: usize,
) -> BatchSummary {
    BatchSummary {
        total_rows,
        resumed_from,
        processed,
        label_counts: checkpoint.label_counts().clone(),
        completed: checkpoint.is_complete(total_rows),
    }
}

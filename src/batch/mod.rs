// Offline batch scoring of tabular datasets with resumable checkpoints.

pub mod checkpoint;
pub mod dataset;
pub mod job;

pub use checkpoint::{Checkpoint, CheckpointRow, CsvCheckpoint};
pub use job::{BatchJob, BatchOptions, BatchSummary};

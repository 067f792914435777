// Dataset files: pulling the text column out of a CSV, and the offline
// preprocessing pass that writes a cleaned copy with length statistics.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::error::DatasetError;
use crate::text::normalize;

fn column_index(headers: &csv::StringRecord, column: &str) -> Result<usize> {
    headers.iter().position(|h| h == column).ok_or_else(|| {
        DatasetError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().map(String::from).collect(),
        }
        .into()
    })
}

/// Read one column of a CSV file. Empty cells come back as `None`.
pub fn read_text_column(path: &Path, column: &str) -> Result<Vec<Option<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;

    let index = column_index(reader.headers()?, column)?;

    let mut values = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad row {} in {}", i + 1, path.display()))?;
        values.push(record.get(index).filter(|v| !v.is_empty()).map(String::from));
    }

    info!(path = %path.display(), column, rows = values.len(), "Read dataset");
    Ok(values)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessStats {
    pub input_rows: usize,
    /// Dropped because the text cell was empty.
    pub missing_text: usize,
    /// Dropped because nothing survived normalization.
    pub empty_after_cleaning: usize,
    pub output_rows: usize,
    pub mean_original_length: f64,
    pub mean_cleaned_length: f64,
}

/// Write a cleaned copy of `input` to `output`.
///
/// Rows with no text, or whose text normalizes to nothing, are dropped.
/// Surviving rows keep every original column and gain `cleaned_text`,
/// `original_length` and `cleaned_length` (character counts).
pub fn preprocess(input: &Path, output: &Path, column: &str) -> Result<PreprocessStats> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("Failed to open dataset {}", input.display()))?;
    let headers = reader.headers()?.clone();
    let index = column_index(&headers, column)?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut out_headers = headers.clone();
    out_headers.push_field("cleaned_text");
    out_headers.push_field("original_length");
    out_headers.push_field("cleaned_length");
    writer.write_record(&out_headers)?;

    let mut stats = PreprocessStats::default();
    let mut original_total = 0usize;
    let mut cleaned_total = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad row {} in {}", i + 1, input.display()))?;
        stats.input_rows += 1;

        let text = record.get(index).unwrap_or_default();
        if text.trim().is_empty() {
            stats.missing_text += 1;
            continue;
        }
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            stats.empty_after_cleaning += 1;
            continue;
        }

        let original_length = text.chars().count();
        let cleaned_length = cleaned.chars().count();
        original_total += original_length;
        cleaned_total += cleaned_length;

        let mut row = record.clone();
        row.push_field(&cleaned);
        row.push_field(&original_length.to_string());
        row.push_field(&cleaned_length.to_string());
        writer.write_record(&row)?;
        stats.output_rows += 1;
    }
    writer.flush().context("Failed to flush preprocessed dataset")?;

    if stats.output_rows > 0 {
        stats.mean_original_length = original_total as f64 / stats.output_rows as f64;
        stats.mean_cleaned_length = cleaned_total as f64 / stats.output_rows as f64;
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        kept = stats.output_rows,
        dropped = stats.missing_text + stats.empty_after_cleaning,
        "Preprocessed dataset"
    );
    Ok(stats)
}

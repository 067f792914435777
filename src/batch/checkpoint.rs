// Batch checkpoint: the durable record of which inputs are done.
//
// One row per processed input, in input order. The CSV implementation
// appends each chunk to the live file and fsyncs it. A crash mid-append can
// leave a torn tail; `load` keeps the longest prefix of complete rows and
// truncates the rest. Row i always belongs to input i, so dropping a suffix
// only means redoing those inputs. Rows are streamed from disk on load and
// never held in memory; only the count and per-label tallies are.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::toxicity::Label;

/// Column order of the checkpoint file.
pub const CHECKPOINT_COLUMNS: [&str; 5] =
    ["original_text", "cleaned_text", "label", "score", "timestamp"];

/// One processed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub original_text: String,
    pub cleaned_text: String,
    pub label: Label,
    pub score: f64,
    /// RFC 3339 processing time.
    pub timestamp: String,
}

/// Durable batch progress.
///
/// `load` must be called before anything else; it (re)reads whatever is
/// stored and returns the number of rows already processed.
pub trait Checkpoint {
    fn load(&mut self) -> Result<usize>;

    /// Durably append rows after the existing ones. On error the next
    /// `load` sees the old rows plus at most a prefix of `rows`.
    fn append_chunk(&mut self, rows: &[CheckpointRow]) -> Result<()>;

    fn rows(&self) -> usize;

    fn label_counts(&self) -> &BTreeMap<Label, usize>;

    fn is_complete(&self, total_inputs: usize) -> bool {
        self.rows() >= total_inputs
    }
}

/// Checkpoint stored as a CSV file with `CHECKPOINT_COLUMNS`.
pub struct CsvCheckpoint {
    path: PathBuf,
    rows: usize,
    label_counts: BTreeMap<Label, usize>,
    /// The file exists and starts with a valid header row.
    has_header: bool,
}

/// What a scan of an existing checkpoint found.
struct Scan {
    rows: usize,
    counts: BTreeMap<Label, usize>,
    /// Byte length of the header plus every complete, valid row.
    valid_len: u64,
    file_len: u64,
}

impl CsvCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: 0,
            label_counts: BTreeMap::new(),
            has_header: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".unreadable");
        PathBuf::from(name)
    }

    /// Count rows and labels in the existing file, stopping at the first
    /// row that is incomplete or does not parse. Fails only if the header
    /// itself is wrong.
    fn scan(&self) -> Result<Scan> {
        let mut bytes = Vec::new();
        File::open(&self.path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let file_len = bytes.len() as u64;

        // Anything after the last newline is an unfinished row
        let complete = bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);

        let mut reader = csv::Reader::from_reader(&bytes[..complete]);
        let headers = reader.headers().context("Failed to read header row")?.clone();
        if !headers.iter().eq(CHECKPOINT_COLUMNS) {
            anyhow::bail!(
                "Unexpected columns: {}",
                headers.iter().collect::<Vec<_>>().join(", ")
            );
        }

        let mut scan = Scan {
            rows: 0,
            counts: BTreeMap::new(),
            valid_len: reader.position().byte(),
            file_len,
        };
        let mut record = csv::StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(row = scan.rows + 1, error = %e, "Checkpoint row unreadable");
                    break;
                }
            }
            match record.deserialize::<CheckpointRow>(Some(&headers)) {
                Ok(row) => {
                    *scan.counts.entry(row.label).or_insert(0) += 1;
                    scan.rows += 1;
                    scan.valid_len = reader.position().byte();
                }
                Err(e) => {
                    warn!(row = scan.rows + 1, error = %e, "Checkpoint row invalid");
                    break;
                }
            }
        }
        Ok(scan)
    }

    /// Cut the file back to its valid prefix.
    fn truncate_to(&self, len: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.set_len(len)
            .with_context(|| format!("Failed to truncate {}", self.path.display()))?;
        file.sync_all().context("Failed to sync checkpoint")?;
        Ok(())
    }
}

impl Checkpoint for CsvCheckpoint {
    fn load(&mut self) -> Result<usize> {
        self.rows = 0;
        self.label_counts.clear();
        self.has_header = false;

        let is_empty = fs::metadata(&self.path).map(|m| m.len() == 0);
        if !matches!(is_empty, Ok(false)) {
            info!(path = %self.path.display(), "No checkpoint found, starting fresh");
            return Ok(0);
        }

        match self.scan() {
            Ok(scan) => {
                if scan.valid_len < scan.file_len {
                    warn!(
                        path = %self.path.display(),
                        kept_rows = scan.rows,
                        dropped_bytes = scan.file_len - scan.valid_len,
                        "Dropping torn checkpoint tail"
                    );
                    self.truncate_to(scan.valid_len)?;
                }
                self.rows = scan.rows;
                self.label_counts = scan.counts;
                self.has_header = true;
                info!(path = %self.path.display(), rows = scan.rows, "Loaded checkpoint");
            }
            Err(e) => {
                // Keep the unreadable file around for inspection
                let aside = self.unreadable_path();
                warn!(
                    path = %self.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Checkpoint unreadable, starting fresh"
                );
                fs::rename(&self.path, &aside).with_context(|| {
                    format!("Failed to move unreadable checkpoint to {}", aside.display())
                })?;
            }
        }
        Ok(self.rows)
    }

    fn append_chunk(&mut self, rows: &[CheckpointRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let file = if self.has_header {
            OpenOptions::new().append(true).open(&self.path)
        } else {
            File::create(&self.path)
        }
        .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(!self.has_header)
            .from_writer(file);
        for row in rows {
            writer.serialize(row).context("Failed to write checkpoint row")?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush checkpoint: {}", e.error()))?;
        file.flush().context("Failed to flush checkpoint")?;
        file.sync_all().context("Failed to sync checkpoint")?;

        self.has_header = true;
        self.rows += rows.len();
        for row in rows {
            *self.label_counts.entry(row.label).or_insert(0) += 1;
        }
        Ok(())
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn label_counts(&self) -> &BTreeMap<Label, usize> {
        &self.label_counts
    }
}

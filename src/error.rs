// Failure taxonomy shared across the pipeline.
//
// Most fallible code returns anyhow::Result. The types here exist where a
// caller has to branch on *what kind* of failure happened: a user analysis
// that failed is not the same as one that found nothing, and a dataset with
// no text column is not an I/O error.

use thiserror::Error;

/// Why a user analysis produced no report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// A platform call failed (network, auth, rate limit, 5xx).
    #[error("platform request failed: {0}")]
    Platform(String),
    /// The request itself was malformed (e.g. blank username).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Problems with the shape of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("column '{column}' not found (available columns: {})", available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_lists_available_columns() {
        let err = DatasetError::MissingColumn {
            column: "comment_text".to_string(),
            available: vec!["id".to_string(), "body".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "column 'comment_text' not found (available columns: id, body)"
        );
    }
}

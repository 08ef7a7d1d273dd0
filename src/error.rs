use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

/// Errors surfaced while loading, deriving or querying a table.
///
/// Per-row data problems never show up here; they become nulls.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("input file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("malformed input {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid derivation for column `{column}`: {message}")]
    Derivation { column: String, message: String },
    /// A query, render mode or pipeline registration that cannot work
    /// against the table or runner it was given.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing output: {0}")]
    Output(#[from] std::io::Error),
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl AnalysisError {
    pub(crate) fn derivation(column: &str, message: impl Into<String>) -> Self {
        AnalysisError::Derivation {
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_column(column: &str) -> Self {
        AnalysisError::InvalidQuery(format!("unknown column `{}`", column))
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;

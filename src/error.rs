//! Error type shared by every stage of the normalization run.

use std::path::{Path, PathBuf};

/// Result type for normalization operations
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Every failure is fatal for the run; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: fs_extra::error::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("column `{column}` row {row}: `{value}` is not a number")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("row {row} has {found} cells but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("required column `{0}` is missing from the header")]
    MissingColumn(String),

    #[error("column `{column}` cannot be standardized: {reason}")]
    DegenerateColumn { column: String, reason: String },

    #[error("scaler artifact: {0}")]
    Serialization(#[from] serde_pickle::Error),

    #[error("invalid config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl NormalizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NormalizeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Splits csv errors: a failing handle is an I/O error on `path`, the
    /// rest is malformed input.
    pub(crate) fn from_csv(err: csv::Error, path: &Path) -> Self {
        if !err.is_io_error() {
            return NormalizeError::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(source) => NormalizeError::io(path, source),
            other => NormalizeError::io(path, std::io::Error::other(format!("{other:?}"))),
        }
    }

    /// Re-labels an I/O error with the file it was really about. The csv
    /// writer only sees an anonymous handle.
    pub(crate) fn at_path(self, path: &Path) -> Self {
        match self {
            NormalizeError::Io { source, .. } => NormalizeError::io(path, source),
            other => other,
        }
    }
}

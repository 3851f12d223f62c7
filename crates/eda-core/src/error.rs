use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the analysis pipeline.
///
/// Every variant belongs to exactly one pipeline stage (see [`EdaError::stage`]);
/// the first error aborts the run.
#[derive(Error, Debug)]
pub enum EdaError {
    /// The input file is missing, unreadable, or failed mid-read.
    #[error("Failed to read input file {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested column is not present in the input header.
    #[error("Column `{column}` not found in header of {path}")]
    Schema { path: PathBuf, column: String },

    /// A timestamp cell could not be read as epoch seconds.
    ///
    /// `row` is the 1-based data row, not counting the header.
    #[error("Row {row}: column `{column}` has non-numeric value {value:?}")]
    FieldParse {
        row: usize,
        column: String,
        value: String,
    },

    /// An epoch timestamp has no representable calendar instant.
    ///
    /// `row` is the 1-based data row, not counting the header.
    #[error("Row {row}: timestamp {timestamp} is outside the representable calendar range")]
    CalendarConversion { row: usize, timestamp: i64 },

    /// An output directory or file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EdaError {
    /// Name of the pipeline stage this error aborts.
    pub fn stage(&self) -> &'static str {
        match self {
            EdaError::FileAccess { .. } | EdaError::Schema { .. } | EdaError::FieldParse { .. } => {
                "load"
            }
            EdaError::CalendarConversion { .. } => "normalize",
            EdaError::Write { .. } => "persist",
            EdaError::Config(_) => "config",
        }
    }

    /// Wrap an I/O error raised while reading `path`.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EdaError::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O error raised while writing `path`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EdaError::Write {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the pipeline crates.
pub type Result<T> = std::result::Result<T, EdaError>;

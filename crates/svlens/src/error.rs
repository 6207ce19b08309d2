//! Error types for the svlens library.

use std::path::PathBuf;
use thiserror::Error;

use crate::dialect::Dialect;

/// Main error type for svlens operations.
#[derive(Debug, Error)]
pub enum SvLensError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reading an in-memory or streamed input.
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),

    /// A data line could not be turned into a record.
    #[error("Malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },

    /// A gzip-family stream could not be decompressed.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// A record's shape matches neither call-file dialect.
    #[error("Cannot resolve dialect at line {line}: {reason}")]
    DialectResolution { line: usize, reason: String },

    /// A record resolved to a different dialect than the partition it is ingested into.
    #[error("Record at line {line} is {found}, expected {expected}")]
    DialectMismatch {
        expected: Dialect,
        found: Dialect,
        line: usize,
    },

    /// Another ingestion of the same partition is still running.
    #[error("Ingestion already in progress for partition '{partition}'")]
    StorageContention { partition: Dialect },

    /// Empty file or no data to compute over.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error saving or loading persisted store state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl SvLensError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SvLensError::StorageContention { .. })
    }
}

/// Result type alias for svlens operations.
pub type Result<T> = std::result::Result<T, SvLensError>;

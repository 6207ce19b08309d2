//! Source file metadata and parsed header.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata about the ingested call file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path (empty for in-memory input).
    pub file: String,
    /// Full path to the file, when read from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// SHA-256 hash of the raw (possibly compressed) bytes.
    pub hash: String,
    /// Raw size in bytes.
    pub size_bytes: u64,
    /// Whether the input carried a gzip-family header.
    pub compressed: bool,
    /// Number of records parsed.
    pub record_count: usize,
    /// When the input was parsed.
    pub parsed_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for parsed input.
    pub fn new(
        path: Option<PathBuf>,
        bytes: &[u8],
        compressed: bool,
        record_count: usize,
    ) -> Self {
        let file = path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash: content_hash(bytes),
            size_bytes: bytes.len() as u64,
            compressed,
            record_count,
            parsed_at: Utc::now(),
        }
    }
}

/// `sha256:<hex>` digest of raw input bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Header section of a call file, retained for lossless export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    /// `##` lines, verbatim.
    pub header_meta: Vec<String>,
    /// The `#CHROM` line, verbatim.
    pub column_header: String,
    /// Sample names from the column header.
    pub samples: Vec<String>,
    /// IDs declared in `##INFO` lines.
    pub info_ids: Vec<String>,
    /// IDs declared in `##FORMAT` lines.
    pub format_ids: Vec<String>,
}

//! Line-oriented call-file parser.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SvLensError};
use super::compression::InputStream;
use super::genotype::parse_sample_genotype;
use super::info::parse_info;
use super::record::{SampleGenotypes, VariantRecord, locus_hint, parse_number};
use super::source::{FileHeader, SourceMetadata};

/// Default record budget per parse.
pub const DEFAULT_MAX_RECORDS: usize = 10_000;

/// Number of positional columns before FORMAT.
const FIXED_COLUMNS: usize = 8;

static DECLARED_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^##(INFO|FORMAT)=<ID=([^,>]+)").unwrap());

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum records to read (None = all). Records past the budget are
    /// dropped and the result is flagged as truncated.
    pub max_records: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_records: Some(DEFAULT_MAX_RECORDS),
        }
    }
}

impl ParserConfig {
    /// Set the record budget.
    pub fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.max_records = max;
        self
    }
}

/// A data line that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Result of parsing one call file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub header: FileHeader,
    pub records: Vec<VariantRecord>,
    pub skipped: Vec<SkippedLine>,
    /// Whether records were dropped because of the record budget.
    pub truncated: bool,
    pub compressed: bool,
}

/// Parses call-file text into records.
pub struct VcfParser {
    config: ParserConfig,
}

impl VcfParser {
    /// Create a new parser with default configuration.
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    /// Create a parser with custom configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a file and return the parsed content and metadata.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<(ParsedFile, SourceMetadata)> {
        let path = path.as_ref();

        let mut file = File::open(path).map_err(|e| SvLensError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(|e| SvLensError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let parsed = self.parse_reader(&contents[..])?;
        let source = SourceMetadata::new(
            Some(path.to_path_buf()),
            &contents,
            parsed.compressed,
            parsed.records.len(),
        );
        Ok((parsed, source))
    }

    /// Parse raw (optionally compressed) bytes.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<(ParsedFile, SourceMetadata)> {
        let parsed = self.parse_reader(bytes)?;
        let source = SourceMetadata::new(None, bytes, parsed.compressed, parsed.records.len());
        Ok((parsed, source))
    }

    /// Parse text that is already decompressed.
    pub fn parse_str(&self, text: &str) -> Result<ParsedFile> {
        self.parse_reader(text.as_bytes())
    }

    /// Parse a stream one line at a time.
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ParsedFile> {
        let mut stream = self.stream(reader)?;
        let mut records = Vec::new();
        while let Some(batch) = stream.next_batch(usize::MAX)? {
            records.extend(batch);
        }
        Ok(stream.finish(records))
    }

    /// Open a stream that yields records in bounded batches, for callers
    /// that interleave parsing with other work.
    pub fn stream<R: Read>(&self, reader: R) -> Result<RecordStream<R>> {
        let stream = InputStream::open(reader).map_err(SvLensError::Read)?;
        Ok(RecordStream {
            compressed: stream.is_compressed(),
            stream,
            max_records: self.config.max_records,
            header: FileHeader::default(),
            skipped: Vec::new(),
            line_no: 0,
            emitted: 0,
            truncated: false,
            done: false,
            buf: Vec::new(),
        })
    }
}

/// Incremental parse over one input.
///
/// Each call to [`RecordStream::next_batch`] reads at most `max_lines`
/// data lines; header lines do not count against the batch.
pub struct RecordStream<R: Read> {
    stream: InputStream<R>,
    compressed: bool,
    max_records: Option<usize>,
    header: FileHeader,
    skipped: Vec<SkippedLine>,
    line_no: usize,
    emitted: usize,
    truncated: bool,
    done: bool,
    buf: Vec<u8>,
}

impl<R: Read> RecordStream<R> {
    /// Header lines seen so far. Complete once the first record is read.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Records produced so far.
    pub fn records_read(&self) -> usize {
        self.emitted
    }

    /// Read the next batch. `None` once the input or the record budget is
    /// exhausted.
    pub fn next_batch(&mut self, max_lines: usize) -> Result<Option<Vec<VariantRecord>>> {
        if self.done {
            return Ok(None);
        }

        let mut records = Vec::new();
        let mut data_lines = 0usize;

        while data_lines < max_lines {
            self.buf.clear();
            let read = self.stream.read_raw_line(&mut self.buf).map_err(|e| {
                if self.compressed {
                    SvLensError::Decompression(e.to_string())
                } else {
                    SvLensError::Read(e)
                }
            })?;
            if read == 0 {
                self.done = true;
                break;
            }
            self.line_no += 1;
            let line_no = self.line_no;

            let Ok(text) = std::str::from_utf8(&self.buf) else {
                warn!(line = line_no, "skipping line with invalid UTF-8");
                self.skipped.push(SkippedLine {
                    line: line_no,
                    reason: "invalid UTF-8".to_string(),
                });
                data_lines += 1;
                continue;
            };
            let line = text.trim_end_matches(['\n', '\r']);

            if line.starts_with("##") {
                scan_declaration(line, &mut self.header);
                self.header.header_meta.push(line.to_string());
                continue;
            }
            if line.starts_with('#') {
                self.header.column_header = line.to_string();
                self.header.samples = line
                    .split('\t')
                    .skip(FIXED_COLUMNS + 1)
                    .map(str::to_string)
                    .collect();
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }

            if self.max_records.is_some_and(|max| self.emitted >= max) {
                self.truncated = true;
                self.done = true;
                break;
            }
            data_lines += 1;

            match parse_record(line, line_no, &self.header.samples) {
                Ok(record) => {
                    self.emitted += 1;
                    records.push(record);
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping malformed record");
                    self.skipped.push(SkippedLine {
                        line: line_no,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if records.is_empty() && self.done {
            return Ok(None);
        }
        Ok(Some(records))
    }

    /// Close the stream, pairing its header and diagnostics with `records`.
    pub fn finish(self, records: Vec<VariantRecord>) -> ParsedFile {
        if self.truncated {
            warn!(
                max_records = self.emitted,
                "record budget reached, remaining records were not read"
            );
        }
        debug!(
            records = records.len(),
            skipped = self.skipped.len(),
            compressed = self.compressed,
            "parsed call file"
        );

        ParsedFile {
            header: self.header,
            records,
            skipped: self.skipped,
            truncated: self.truncated,
            compressed: self.compressed,
        }
    }
}

impl Default for VcfParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a declared INFO/FORMAT identifier.
fn scan_declaration(line: &str, header: &mut FileHeader) {
    let Some(caps) = DECLARED_FIELD.captures(line) else {
        return;
    };
    let id = caps[2].to_string();
    let target = if &caps[1] == "INFO" {
        &mut header.info_ids
    } else {
        &mut header.format_ids
    };
    if !target.contains(&id) {
        target.push(id);
    }
}

/// Parse a single data line.
pub fn parse_record(line: &str, line_no: usize, samples: &[String]) -> Result<VariantRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < FIXED_COLUMNS {
        return Err(SvLensError::MalformedInput {
            line: line_no,
            message: format!(
                "expected at least {} tab-separated fields, found {}",
                FIXED_COLUMNS,
                fields.len()
            ),
        });
    }

    let chromosome = fields[0].trim().to_string();
    let position = fields[1]
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| SvLensError::MalformedInput {
            line: line_no,
            message: format!("invalid POS '{}'", fields[1]),
        })?;

    let id = match fields[2].trim() {
        "" | "." => None,
        other => Some(other.to_string()),
    };

    let raw_quality = match fields[5].trim() {
        "" | "." => None,
        other => Some(other.to_string()),
    };
    let quality = match raw_quality.as_deref() {
        None => None,
        Some(text) => Some(parse_number(text).ok_or_else(|| SvLensError::MalformedInput {
            line: line_no,
            message: format!("invalid QUAL '{}'", text),
        })?),
    };

    let raw_info = fields[7].to_string();
    let info = parse_info(&raw_info);

    let format_keys: Vec<String> = match fields.get(FIXED_COLUMNS).map(|f| f.trim()) {
        Some("") | Some(".") | None => Vec::new(),
        Some(format) => format.split(':').map(str::to_string).collect(),
    };

    let sample_fields = fields.get(FIXED_COLUMNS + 1..).unwrap_or_default();
    let genotypes = if sample_fields.is_empty() {
        None
    } else {
        let mut blocks = SampleGenotypes::new();
        for (idx, sample_field) in sample_fields.iter().enumerate() {
            let name = samples
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("SAMPLE{}", idx + 1));
            blocks.insert(name, parse_sample_genotype(sample_field, &format_keys));
        }
        Some(blocks)
    };
    let raw_samples = match &genotypes {
        // Repeated sample names collapse blocks; keep raw text only when
        // it lines up with the parsed blocks.
        Some(blocks) if blocks.len() == sample_fields.len() => {
            sample_fields.iter().map(|f| f.to_string()).collect()
        }
        _ => Vec::new(),
    };

    let locus_hint = locus_hint(&chromosome, position, &info);

    Ok(VariantRecord {
        chromosome,
        position,
        id,
        reference: fields[3].trim().to_string(),
        alternate: fields[4].trim().to_string(),
        quality,
        raw_quality,
        filter_status: fields[6].trim().to_string(),
        info,
        raw_info,
        derived_info: Vec::new(),
        format_keys,
        genotypes,
        raw_samples,
        locus_hint,
        source_line: line_no,
    })
}

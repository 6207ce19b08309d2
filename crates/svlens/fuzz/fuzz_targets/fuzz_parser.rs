//! Fuzz target for the call-file parser.
//!
//! This fuzzer tests that the parser:
//! 1. Never panics on malformed or truncated input, plain or gzip
//! 2. Keeps source line numbers inside the input
//! 3. Classifies every record without panicking

#![no_main]

use std::io::Write;

use arbitrary::Arbitrary;
use flate2::Compression;
use flate2::write::GzEncoder;
use libfuzzer_sys::fuzz_target;
use svlens::input::is_gzip;
use svlens::{FieldAnalyzer, HandlerRegistry, ParserConfig, VcfParser};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    data: &'a [u8],
    compress: bool,
}

fuzz_target!(|input: Input<'_>| {
    // Only process reasonable-sized inputs to avoid OOM
    if input.data.len() > 100_000 {
        return;
    }

    let bytes = if input.compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        if encoder.write_all(input.data).is_err() {
            return;
        }
        match encoder.finish() {
            Ok(bytes) => bytes,
            Err(_) => return,
        }
    } else {
        input.data.to_vec()
    };

    let parser = VcfParser::with_config(ParserConfig::default().with_max_records(Some(1_000)));
    let Ok((parsed, _)) = parser.parse_bytes(&bytes) else {
        return;
    };

    // raw gzip input is decompressed, so its lines are not the fuzzer's lines
    if input.compress || !is_gzip(input.data) {
        let lines = input.data.split(|b| *b == b'\n').count();
        for record in &parsed.records {
            assert!(record.source_line >= 1 && record.source_line <= lines);
        }
    }

    let registry = HandlerRegistry::new();
    for record in &parsed.records {
        if let Ok(dialect) = registry.identify(record) {
            let _ = registry.callers(record, dialect);
            let _ = registry.primary_sample(record, dialect);
        }
    }
    let _ = FieldAnalyzer::new().build_field_metadata(parsed.records.as_slice(), &registry);
});

//! Field metadata inference: schema-on-read over live records.

mod accumulator;
mod analyzer;

pub use analyzer::{AnalyzerConfig, FieldAnalyzer};

//! Field classification over a record set.

use std::borrow::{Borrow, Cow};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::{CALLER_LIST_FIELD, HandlerRegistry};
use crate::input::{FixedColumn, GenotypeMap, VariantRecord};
use crate::schema::{FieldMetadataMap, FieldSource, FieldStats};

use super::accumulator::FieldAccumulator;

/// FORMAT key hidden from the field namespace.
const HIDDEN_FORMAT_KEY: &str = "ID";

/// Thresholds used when classifying fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum distinct values for a categorical field.
    pub categorical_threshold: usize,
    /// Maximum distinct values for a boolean field.
    pub boolean_threshold: usize,
    /// Field whose components are callers.
    pub caller_field: String,
    /// Separator for multi-valued fields.
    pub multi_value_separator: char,
    /// Distinct values kept per field.
    pub max_tracked_values: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            categorical_threshold: 50,
            boolean_threshold: 2,
            caller_field: CALLER_LIST_FIELD.to_string(),
            multi_value_separator: ',',
            max_tracked_values: 256,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_categorical_threshold(mut self, threshold: usize) -> Self {
        self.categorical_threshold = threshold;
        self
    }

    pub fn with_caller_field(mut self, field: impl Into<String>) -> Self {
        self.caller_field = field.into();
        self
    }

    pub fn with_max_tracked_values(mut self, max: usize) -> Self {
        self.max_tracked_values = max;
        self
    }
}

/// Classifies fields and computes per-field statistics from live data.
#[derive(Debug, Clone, Default)]
pub struct FieldAnalyzer {
    config: AnalyzerConfig,
}

impl FieldAnalyzer {
    /// Create an analyzer with default thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with custom thresholds.
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classify a single field from its values, one per record.
    /// `None` stands for a record without the field.
    pub fn analyze_field<I, S>(&self, name: &str, values: I) -> FieldStats
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let source = if FixedColumn::from_name(name).is_some() {
            FieldSource::Fixed
        } else {
            FieldSource::Info
        };

        let mut acc = self.accumulator(name);
        for value in values {
            acc.add(value.as_ref().map(|v| v.as_ref()));
        }
        acc.finish(name, source, &self.config)
    }

    /// Classify every field seen in a record set.
    ///
    /// The namespace is the fixed columns, then every INFO key, then every
    /// FORMAT key of each record's primary sample. Primary samples are
    /// selected per record through the registry; records whose dialect
    /// cannot be resolved contribute no FORMAT values.
    pub fn build_field_metadata<R>(&self, records: &[R], registry: &HandlerRegistry) -> FieldMetadataMap
    where
        R: Borrow<VariantRecord>,
    {
        let primaries: Vec<Option<&GenotypeMap>> = records
            .iter()
            .map(|r| {
                let record = r.borrow();
                registry
                    .identify(record)
                    .ok()
                    .and_then(|dialect| registry.primary_sample(record, dialect))
            })
            .collect();

        let mut fields: IndexMap<String, FieldSource> = FixedColumn::ALL
            .iter()
            .map(|c| (c.name().to_string(), FieldSource::Fixed))
            .collect();
        for record in records {
            for key in record.borrow().info.keys() {
                fields.entry(key.clone()).or_insert(FieldSource::Info);
            }
        }
        for primary in primaries.iter().flatten() {
            for key in primary.keys().filter(|k| *k != HIDDEN_FORMAT_KEY) {
                fields.entry(key.clone()).or_insert(FieldSource::Format);
            }
        }

        let mut metadata = FieldMetadataMap::with_capacity(fields.len());
        for (name, source) in fields {
            let mut acc = self.accumulator(&name);
            for (record, primary) in records.iter().zip(primaries.iter().copied()) {
                let value = match source {
                    FieldSource::Format => primary
                        .and_then(|p| p.get(&name))
                        .map(|v| Cow::Borrowed(v.as_str())),
                    _ => record.borrow().field_value(&name, None),
                };
                acc.add(value.as_deref());
            }
            metadata.insert(name.clone(), acc.finish(&name, source, &self.config));
        }

        debug!(
            fields = metadata.len(),
            records = records.len(),
            "Built field metadata"
        );
        metadata
    }

    fn accumulator(&self, name: &str) -> FieldAccumulator {
        FieldAccumulator::new(&self.config, name == self.config.caller_field)
    }
}

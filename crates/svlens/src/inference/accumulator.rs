//! Single-pass per-field accumulation.

use indexmap::IndexSet;

use crate::input::{is_missing_value, parse_number};
use crate::schema::{FieldSource, FieldStats, FieldType};

use super::AnalyzerConfig;

/// Streaming accumulator for one field.
///
/// Numeric bounds are tracked with a running comparison so arbitrarily
/// large record sets never need a recursive reduction.
#[derive(Debug, Clone)]
pub(crate) struct FieldAccumulator {
    separator: char,
    /// Treat every separator-joined component as its own value.
    split_components: bool,
    max_tracked: usize,
    all_numeric: bool,
    saw_number: bool,
    min: f64,
    max: f64,
    unique: IndexSet<String>,
    values_truncated: bool,
    has_multiple: bool,
    count: usize,
    null_count: usize,
}

impl FieldAccumulator {
    pub(crate) fn new(config: &AnalyzerConfig, split_components: bool) -> Self {
        Self {
            separator: config.multi_value_separator,
            split_components,
            max_tracked: config.max_tracked_values.max(config.categorical_threshold + 1),
            all_numeric: true,
            saw_number: false,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            unique: IndexSet::new(),
            values_truncated: false,
            has_multiple: false,
            count: 0,
            null_count: 0,
        }
    }

    /// Add one record's value; `None` and missing markers count as null.
    pub(crate) fn add(&mut self, value: Option<&str>) {
        let Some(value) = value.filter(|v| !is_missing_value(v)) else {
            self.null_count += 1;
            return;
        };
        self.count += 1;

        let multi = value.contains(self.separator);
        if multi {
            self.has_multiple = true;
        }

        if self.split_components {
            for component in value.split(self.separator).map(str::trim) {
                if !is_missing_value(component) {
                    self.track(component);
                }
            }
            return;
        }

        self.track(value.trim());
        if !self.all_numeric {
            return;
        }
        if multi {
            for component in value.split(self.separator) {
                if !is_missing_value(component) {
                    self.vote(component);
                }
            }
        } else {
            self.vote(value);
        }
    }

    fn vote(&mut self, raw: &str) {
        match parse_number(raw) {
            Some(n) => {
                self.saw_number = true;
                if n < self.min {
                    self.min = n;
                }
                if n > self.max {
                    self.max = n;
                }
            }
            None => self.all_numeric = false,
        }
    }

    fn track(&mut self, value: &str) {
        if self.unique.contains(value) {
            return;
        }
        if self.unique.len() < self.max_tracked {
            self.unique.insert(value.to_string());
        } else {
            self.values_truncated = true;
        }
    }

    fn classify(&self, config: &AnalyzerConfig) -> FieldType {
        let distinct = self.unique.len();
        let bounded = !self.values_truncated;

        if self.split_components {
            return if bounded && distinct > 0 && distinct <= config.categorical_threshold {
                FieldType::Categorical
            } else {
                FieldType::String
            };
        }

        if self.all_numeric && self.saw_number {
            FieldType::Numeric
        } else if !self.has_multiple && bounded && (1..=config.boolean_threshold).contains(&distinct) {
            FieldType::Boolean
        } else if !self.has_multiple && bounded && distinct > 0 && distinct <= config.categorical_threshold {
            FieldType::Categorical
        } else {
            FieldType::String
        }
    }

    pub(crate) fn finish(self, name: &str, source: FieldSource, config: &AnalyzerConfig) -> FieldStats {
        let field_type = self.classify(config);
        let (min, max) = if field_type == FieldType::Numeric {
            (Some(self.min), Some(self.max))
        } else {
            (None, None)
        };

        let mut unique_values: Vec<String> = self.unique.into_iter().collect();
        unique_values.sort();

        FieldStats {
            name: name.to_string(),
            source,
            field_type,
            unique_values,
            values_truncated: self.values_truncated,
            has_null: self.null_count > 0,
            has_multiple: self.has_multiple,
            min,
            max,
            count: self.count,
            null_count: self.null_count,
        }
    }
}

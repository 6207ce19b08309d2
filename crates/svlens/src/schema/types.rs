//! Core type definitions for field metadata.

use serde::{Deserialize, Serialize};

/// Inferred type of a field, driving which filter control it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Every non-missing value (or component) parses as a number.
    Numeric,
    /// At most two distinct scalar values.
    Boolean,
    /// A small closed set of scalar values.
    Categorical,
    /// Anything else.
    String,
}

impl FieldType {
    /// Returns true if values can be filtered by range.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Numeric)
    }

    /// Returns true if values can be filtered by set membership.
    pub fn is_enumerable(&self) -> bool {
        matches!(self, FieldType::Boolean | FieldType::Categorical)
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::String
    }
}

/// Where a field's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// One of the seven fixed columns.
    Fixed,
    /// An INFO key.
    Info,
    /// A FORMAT key of the primary sample.
    Format,
}

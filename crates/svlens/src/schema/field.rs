//! Per-field statistics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{FieldSource, FieldType};

/// Classification and summary of one field across a record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Field name.
    pub name: String,
    /// Where the field's values come from.
    pub source: FieldSource,
    /// Inferred type.
    pub field_type: FieldType,
    /// Distinct non-missing values (or components), sorted. Bounded; see
    /// `values_truncated`.
    pub unique_values: Vec<String>,
    /// Whether more distinct values were seen than were kept.
    pub values_truncated: bool,
    /// Whether any record had no value for this field.
    pub has_null: bool,
    /// Whether any value was a separator-joined list.
    pub has_multiple: bool,
    /// Smallest numeric value, numeric fields only.
    pub min: Option<f64>,
    /// Largest numeric value, numeric fields only.
    pub max: Option<f64>,
    /// Records with a value.
    pub count: usize,
    /// Records without a value.
    pub null_count: usize,
}

impl FieldStats {
    /// Number of distinct values kept.
    pub fn unique_count(&self) -> usize {
        self.unique_values.len()
    }

    /// Returns true if the field has at least one value.
    pub fn is_populated(&self) -> bool {
        self.count > 0
    }

    /// Numeric range, if the field is numeric and non-empty.
    pub fn range(&self) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Field name to statistics, in namespace order: fixed columns, then
/// INFO keys, then FORMAT keys, each in first-seen order.
pub type FieldMetadataMap = IndexMap<String, FieldStats>;

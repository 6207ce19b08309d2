//! Schema types for field metadata inferred from live records.

mod field;
mod types;

pub use field::{FieldMetadataMap, FieldStats};
pub use types::{FieldSource, FieldType};

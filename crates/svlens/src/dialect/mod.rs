//! Call-file dialects and their per-record handlers.
//!
//! Two merge conventions share one record model:
//!
//! - [`Dialect::AggregateCaller`]: one genotype block, supporting callers in
//!   a single comma-joined INFO field (or a single-caller INFO field).
//! - [`Dialect::PerCallerGenotype`]: one genotype block per caller.
//!
//! The [`HandlerRegistry`] resolves the dialect from a record's structural
//! shape and exposes the matching handler.

mod aggregate;
mod aggregation;
mod per_caller;
mod registry;

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::input::{GenotypeMap, VariantRecord};

pub use aggregate::AggregateCallerHandler;
pub use aggregation::CallerAggregator;
pub use per_caller::PerCallerGenotypeHandler;
pub use registry::HandlerRegistry;

/// INFO field holding the comma-joined supporting-caller list.
pub const CALLER_LIST_FIELD: &str = "SUPP_CALLERS";

/// INFO fields naming the single caller of an unmerged record.
pub const SINGLE_CALLER_FIELDS: [&str; 2] = ["EUK_CALLER", "CALLER"];

/// INFO field holding the per-sample support bit vector.
pub const SUPPORT_VECTOR_FIELD: &str = "SUPP_VEC";

/// INFO field holding the number of distinct supporting callers.
pub const CALLER_COUNT_FIELD: &str = "NUM_CALLERS";

/// INFO field holding the structural-variant type.
pub const SV_TYPE_FIELD: &str = "SVTYPE";

/// Structural convention a record follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    AggregateCaller,
    PerCallerGenotype,
}

impl Dialect {
    /// Both dialects.
    pub const ALL: [Dialect; 2] = [Dialect::AggregateCaller, Dialect::PerCallerGenotype];

    /// Stable identifier, used for partition file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::AggregateCaller => "aggregate_caller",
            Dialect::PerCallerGenotype => "per_caller_genotype",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dialect-specific record handling.
pub trait DialectHandler: Send + Sync {
    /// The dialect this handler serves.
    fn dialect(&self) -> Dialect;

    /// Whether the record's shape belongs to this dialect.
    fn matches(&self, record: &VariantRecord) -> bool;

    /// Genotype block used for single-valued per-record statistics.
    fn primary_sample<'a>(&self, record: &'a VariantRecord) -> Option<&'a GenotypeMap>;

    /// Supporting callers in order of appearance, duplicates kept.
    /// Used when counting caller co-occurrence.
    fn callers_with_duplicates(&self, record: &VariantRecord) -> Vec<String>;

    /// Supporting callers, de-duplicated and sorted, for set membership.
    fn callers(&self, record: &VariantRecord) -> Vec<String> {
        let mut callers = self.callers_with_duplicates(record);
        callers.sort();
        callers.dedup();
        callers
    }

    /// Structural-variant type of the record.
    fn sv_type<'a>(&self, record: &'a VariantRecord) -> Option<Cow<'a, str>> {
        record.sv_type()
    }

    /// Fill in fields the dialect implies but the record leaves out.
    fn derive(&self, record: VariantRecord) -> VariantRecord {
        record
    }
}

/// Split a comma-joined caller list, trimming blanks.
pub fn split_callers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != ".")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_callers() {
        assert_eq!(split_callers("delly, manta,,delly"), vec!["delly", "manta", "delly"]);
        assert!(split_callers(".").is_empty());
        assert!(split_callers("").is_empty());
    }

    #[test]
    fn test_dialect_names() {
        assert_eq!(Dialect::AggregateCaller.to_string(), "aggregate_caller");
        assert_eq!(
            serde_json::to_string(&Dialect::PerCallerGenotype).unwrap(),
            "\"per_caller_genotype\""
        );
    }
}

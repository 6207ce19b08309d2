//! Aggregate-caller dialect (bcftools-style merges).

use crate::input::{GenotypeMap, VariantRecord};

use super::{CALLER_LIST_FIELD, Dialect, DialectHandler, SINGLE_CALLER_FIELDS, split_callers};

/// One genotype block per record, callers listed in a single INFO field.
#[derive(Debug, Clone, Default)]
pub struct AggregateCallerHandler;

impl AggregateCallerHandler {
    pub fn new() -> Self {
        Self
    }

    fn caller_text<'a>(&self, record: &'a VariantRecord) -> Option<std::borrow::Cow<'a, str>> {
        record.info_text(CALLER_LIST_FIELD).or_else(|| {
            SINGLE_CALLER_FIELDS
                .iter()
                .find_map(|field| record.info_text(field))
        })
    }
}

impl DialectHandler for AggregateCallerHandler {
    fn dialect(&self) -> Dialect {
        Dialect::AggregateCaller
    }

    fn matches(&self, record: &VariantRecord) -> bool {
        record.sample_count() <= 1 && self.caller_text(record).is_some()
    }

    fn primary_sample<'a>(&self, record: &'a VariantRecord) -> Option<&'a GenotypeMap> {
        record
            .genotypes
            .as_ref()
            .and_then(|g| g.first())
            .map(|(_, block)| block)
    }

    fn callers_with_duplicates(&self, record: &VariantRecord) -> Vec<String> {
        self.caller_text(record)
            .map(|text| split_callers(&text))
            .unwrap_or_default()
    }
}

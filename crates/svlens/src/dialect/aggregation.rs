//! Cross-record caller aggregation for unmerged aggregate-caller files.
//!
//! A bcftools-style merge of single-caller files carries one record per
//! caller, each naming its caller in `EUK_CALLER` or `CALLER`. Records at
//! the same `(CHROM, POS, SVTYPE)` describe one variant, so their callers are
//! joined into a `SUPP_CALLERS` list with a `NUM_CALLERS` count.

use std::collections::{BTreeSet, HashMap};

use crate::input::{InfoValue, VariantRecord};

use super::{CALLER_COUNT_FIELD, CALLER_LIST_FIELD, SINGLE_CALLER_FIELDS, split_callers};

/// `(chromosome, position, SV type)`.
type LocusKey = (String, u64, String);

/// Collects callers per locus, then stamps each record with its group's list.
///
/// Feed every record to [`observe`](Self::observe) first; [`apply`](Self::apply)
/// only sees groups built from observed records.
#[derive(Debug, Clone, Default)]
pub struct CallerAggregator {
    groups: HashMap<LocusKey, BTreeSet<String>>,
}

impl CallerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grouping key and single-caller value, for records that need one.
    fn key_and_callers(record: &VariantRecord) -> Option<(LocusKey, Vec<String>)> {
        if record.info_text(CALLER_LIST_FIELD).is_some() {
            return None;
        }
        let callers = SINGLE_CALLER_FIELDS
            .iter()
            .find_map(|field| record.info_text(field))
            .map(|text| split_callers(&text))?;
        let sv_type = record.sv_type()?;
        Some((
            (record.chromosome.clone(), record.position, sv_type.into_owned()),
            callers,
        ))
    }

    /// Add a record's caller to its locus group.
    pub fn observe(&mut self, record: &VariantRecord) {
        if let Some((key, callers)) = Self::key_and_callers(record) {
            self.groups.entry(key).or_default().extend(callers);
        }
    }

    /// Number of loci seen.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Record with `SUPP_CALLERS` and `NUM_CALLERS` derived from its group.
    /// Records that already list their callers pass through unchanged.
    pub fn apply(&self, record: VariantRecord) -> VariantRecord {
        let Some(callers) = Self::key_and_callers(&record)
            .and_then(|(key, _)| self.groups.get(&key))
            .filter(|callers| !callers.is_empty())
        else {
            return record;
        };

        let list = callers.iter().cloned().collect::<Vec<_>>().join(",");
        let count = callers.len();
        record
            .with_derived_info(CALLER_LIST_FIELD, InfoValue::Text(list))
            .with_derived_info(
                CALLER_COUNT_FIELD,
                InfoValue::Number {
                    value: count as f64,
                    text: count.to_string(),
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, HandlerRegistry};
    use crate::input::VcfParser;

    fn records(lines: &[&str]) -> Vec<VariantRecord> {
        let mut text = String::from("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n");
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        VcfParser::new().parse_str(&text).unwrap().records
    }

    fn aggregate(records: Vec<VariantRecord>) -> Vec<VariantRecord> {
        let mut aggregator = CallerAggregator::new();
        records.iter().for_each(|r| aggregator.observe(r));
        records.into_iter().map(|r| aggregator.apply(r)).collect()
    }

    #[test]
    fn test_groups_by_locus_and_type() {
        let out = aggregate(records(&[
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;EUK_CALLER=manta",
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;EUK_CALLER=delly",
            "chr1\t100\t.\tN\t<DUP>\t.\tPASS\tSVTYPE=DUP;EUK_CALLER=delly",
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;CALLER=manta",
        ]));

        let lists: Vec<String> = out
            .iter()
            .map(|r| r.info_text("SUPP_CALLERS").unwrap().into_owned())
            .collect();
        assert_eq!(lists, vec!["delly,manta", "delly,manta", "delly", "delly,manta"]);
        assert_eq!(out[0].info_f64("NUM_CALLERS"), Some(2.0));
        assert_eq!(out[2].info_f64("NUM_CALLERS"), Some(1.0));
        assert_eq!(out[0].derived_info, vec!["SUPP_CALLERS", "NUM_CALLERS"]);
    }

    #[test]
    fn test_existing_lists_untouched() {
        let out = aggregate(records(&[
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SUPP_CALLERS=lumpy;CALLER=manta",
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;CALLER=delly",
        ]));

        assert_eq!(out[0].info_text("SUPP_CALLERS").unwrap(), "lumpy");
        assert!(out[0].derived_info.is_empty());
        assert_eq!(out[1].info_text("SUPP_CALLERS").unwrap(), "delly");
    }

    #[test]
    fn test_records_without_type_not_grouped() {
        let mut aggregator = CallerAggregator::new();
        let recs = records(&["chr1\t100\t.\tN\t<DEL>\t.\tPASS\tCALLER=delly"]);
        aggregator.observe(&recs[0]);

        assert!(aggregator.is_empty());
        assert!(aggregator.apply(recs[0].clone()).derived_info.is_empty());
    }

    #[test]
    fn test_aggregated_callers_feed_handler() {
        let registry = HandlerRegistry::new();
        let out = aggregate(records(&[
            "chr2\t50\t.\tN\t<INS>\t.\tPASS\tSVTYPE=INS;EUK_CALLER=sniffles",
            "chr2\t50\t.\tN\t<INS>\t.\tPASS\tSVTYPE=INS;EUK_CALLER=cutesv",
        ]));

        assert_eq!(
            registry.callers(&out[1], Dialect::AggregateCaller),
            vec!["cutesv", "sniffles"]
        );
    }
}

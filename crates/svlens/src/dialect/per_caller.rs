//! Per-caller genotype dialect (SURVIVOR-style merges).

use std::borrow::Cow;

use crate::input::{GenotypeMap, InfoValue, VariantRecord, is_missing_value};

use super::{
    CALLER_LIST_FIELD, Dialect, DialectHandler, SUPPORT_VECTOR_FIELD, SV_TYPE_FIELD, split_callers,
};

/// FORMAT key carrying the per-caller record ID (`caller_SVTYPE`).
const SAMPLE_ID_KEY: &str = "ID";

/// One genotype block per caller.
#[derive(Debug, Clone, Default)]
pub struct PerCallerGenotypeHandler;

impl PerCallerGenotypeHandler {
    pub fn new() -> Self {
        Self
    }

    /// Indices of samples whose support bit is set.
    fn supported_indices(&self, record: &VariantRecord) -> Vec<usize> {
        record
            .info_text(SUPPORT_VECTOR_FIELD)
            .map(|bits| {
                bits.chars()
                    .enumerate()
                    .filter(|(_, bit)| *bit == '1')
                    .map(|(idx, _)| idx)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Type suffix of a `caller_SVTYPE` record ID.
    fn id_sv_type<'a>(&self, record: &'a VariantRecord) -> Option<&'a str> {
        record
            .id
            .as_deref()
            .and_then(|id| id.split('_').nth(1))
            .filter(|t| !is_missing_value(t))
    }
}

impl DialectHandler for PerCallerGenotypeHandler {
    fn dialect(&self) -> Dialect {
        Dialect::PerCallerGenotype
    }

    fn matches(&self, record: &VariantRecord) -> bool {
        record.sample_count() >= 2
    }

    /// First sample flagged in `SUPP_VEC`, else the first declared sample.
    fn primary_sample<'a>(&self, record: &'a VariantRecord) -> Option<&'a GenotypeMap> {
        let genotypes = record.genotypes.as_ref()?;
        self.supported_indices(record)
            .into_iter()
            .find_map(|idx| genotypes.get_index(idx))
            .or_else(|| genotypes.first())
            .map(|(_, block)| block)
    }

    fn callers_with_duplicates(&self, record: &VariantRecord) -> Vec<String> {
        if let Some(list) = record.info_text(CALLER_LIST_FIELD) {
            return split_callers(&list);
        }

        let Some(genotypes) = record.genotypes.as_ref() else {
            return Vec::new();
        };

        let from_ids: Vec<String> = genotypes
            .values()
            .filter_map(|block| block.get(SAMPLE_ID_KEY))
            .filter(|id| !is_missing_value(id))
            .filter_map(|id| id.split_once('_').map(|(caller, _)| caller.to_string()))
            .collect();
        if !from_ids.is_empty() {
            return from_ids;
        }

        self.supported_indices(record)
            .into_iter()
            .filter_map(|idx| genotypes.get_index(idx))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// INFO `SVTYPE`, else the type suffix of the record ID.
    fn sv_type<'a>(&self, record: &'a VariantRecord) -> Option<Cow<'a, str>> {
        record
            .sv_type()
            .or_else(|| self.id_sv_type(record).map(Cow::Borrowed))
    }

    fn derive(&self, record: VariantRecord) -> VariantRecord {
        if record.sv_type().is_some() {
            return record;
        }
        match self.id_sv_type(&record).map(str::to_string) {
            Some(sv_type) => record.with_derived_info(SV_TYPE_FIELD, InfoValue::Text(sv_type)),
            None => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VcfParser;

    fn record(line: &str) -> VariantRecord {
        let header = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tdelly\tmanta\tlumpy\n";
        VcfParser::new()
            .parse_str(&format!("{}{}\n", header, line))
            .unwrap()
            .records
            .remove(0)
    }

    #[test]
    fn test_primary_sample_follows_support_vector() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record(
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;SUPP_VEC=011\tGT:ID\t./.:NaN\t0/1:manta_DEL\t1/1:lumpy_DEL",
        );

        assert!(handler.matches(&r));
        assert_eq!(handler.primary_sample(&r).unwrap()["GT"], "0/1");
        assert_eq!(handler.callers(&r), vec!["lumpy", "manta"]);
    }

    #[test]
    fn test_primary_sample_defaults_to_first() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record("chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL\tGT\t0/1\t1/1\t./.");
        assert_eq!(handler.primary_sample(&r).unwrap()["GT"], "0/1");
    }

    #[test]
    fn test_callers_from_support_vector_names() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record("chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSUPP_VEC=101\tGT\t0/1\t./.\t1/1");
        assert_eq!(handler.callers_with_duplicates(&r), vec!["delly", "lumpy"]);
    }

    #[test]
    fn test_caller_list_field_wins() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record(
            "chr1\t100\t.\tN\t<DEL>\t.\tPASS\tSUPP_CALLERS=delly,delly\tGT:ID\t0/1:delly_DEL\t0/1:delly_DEL\t./.:.",
        );
        assert_eq!(handler.callers_with_duplicates(&r), vec!["delly", "delly"]);
        assert_eq!(handler.callers(&r), vec!["delly"]);
    }

    #[test]
    fn test_sv_type_from_record_id() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record("chr1\t100\tsniffles_INV\tN\t<INV>\t.\tPASS\tSUPP_VEC=110\tGT\t0/1\t0/1\t./.");
        assert!(r.sv_type().is_none());
        assert_eq!(handler.sv_type(&r).unwrap(), "INV");

        let derived = handler.derive(r);
        assert_eq!(derived.sv_type().unwrap(), "INV");
        assert_eq!(derived.derived_info, vec!["SVTYPE"]);
    }

    #[test]
    fn test_info_sv_type_wins() {
        let handler = PerCallerGenotypeHandler::new();
        let r = record("chr1\t100\tsniffles_INV\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL\tGT\t0/1\t0/1\t./.");
        assert_eq!(handler.sv_type(&r).unwrap(), "DEL");
        assert!(handler.derive(r).derived_info.is_empty());

        let plain = record("chr1\t100\tsv7\tN\t<DEL>\t.\tPASS\t.\tGT\t0/1\t0/1\t./.");
        assert!(handler.sv_type(&plain).is_none());
    }
}

//! Dialect resolution.

use std::borrow::Cow;

use tracing::trace;

use crate::error::{Result, SvLensError};
use crate::input::{GenotypeMap, VariantRecord};

use super::{AggregateCallerHandler, Dialect, DialectHandler, PerCallerGenotypeHandler};

/// Holds one handler per dialect and picks between them by record shape.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    aggregate: AggregateCallerHandler,
    per_caller: PerCallerGenotypeHandler,
}

impl HandlerRegistry {
    /// Registry with both built-in handlers.
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers(&self) -> [&dyn DialectHandler; 2] {
        [&self.aggregate, &self.per_caller]
    }

    /// Handler for a dialect.
    pub fn handler(&self, dialect: Dialect) -> &dyn DialectHandler {
        match dialect {
            Dialect::AggregateCaller => &self.aggregate,
            Dialect::PerCallerGenotype => &self.per_caller,
        }
    }

    /// Resolve a record's dialect from its shape.
    ///
    /// Two or more genotype blocks mean per-caller genotypes. At most one
    /// block plus a caller-list INFO field means an aggregate record.
    /// Anything else is unresolvable.
    pub fn identify(&self, record: &VariantRecord) -> Result<Dialect> {
        let matched: Vec<Dialect> = self
            .handlers()
            .into_iter()
            .filter(|h| h.matches(record))
            .map(|h| h.dialect())
            .collect();

        match matched.as_slice() {
            [dialect] => {
                trace!(line = record.source_line, %dialect, "Resolved dialect");
                Ok(*dialect)
            }
            [] => Err(SvLensError::DialectResolution {
                line: record.source_line,
                reason: format!(
                    "{} genotype block(s) and no caller-list INFO field",
                    record.sample_count()
                ),
            }),
            _ => Err(SvLensError::DialectResolution {
                line: record.source_line,
                reason: "record matches more than one dialect".to_string(),
            }),
        }
    }

    /// Primary genotype block for a record of a known dialect.
    pub fn primary_sample<'a>(
        &self,
        record: &'a VariantRecord,
        dialect: Dialect,
    ) -> Option<&'a GenotypeMap> {
        self.handler(dialect).primary_sample(record)
    }

    /// De-duplicated callers for a record of a known dialect.
    pub fn callers(&self, record: &VariantRecord, dialect: Dialect) -> Vec<String> {
        self.handler(dialect).callers(record)
    }

    /// Callers with duplicates kept, for a record of a known dialect.
    pub fn callers_with_duplicates(&self, record: &VariantRecord, dialect: Dialect) -> Vec<String> {
        self.handler(dialect).callers_with_duplicates(record)
    }

    /// Structural-variant type for a record of a known dialect.
    pub fn sv_type<'a>(&self, record: &'a VariantRecord, dialect: Dialect) -> Option<Cow<'a, str>> {
        self.handler(dialect).sv_type(record)
    }

    /// Record with its dialect's implied fields filled in.
    pub fn derive(&self, record: VariantRecord, dialect: Dialect) -> VariantRecord {
        self.handler(dialect).derive(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VcfParser;

    fn parse(samples: &[&str], line: &str) -> VariantRecord {
        let mut header = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO".to_string();
        if !samples.is_empty() {
            header.push_str("\tFORMAT");
            for s in samples {
                header.push('\t');
                header.push_str(s);
            }
        }
        VcfParser::new()
            .parse_str(&format!("{}\n{}\n", header, line))
            .unwrap()
            .records
            .remove(0)
    }

    #[test]
    fn test_identify_aggregate() {
        let registry = HandlerRegistry::new();
        let r = parse(
            &["merged"],
            "chr1\t10\t.\tN\t<DEL>\t.\tPASS\tSUPP_CALLERS=delly,manta\tGT\t0/1",
        );
        assert_eq!(registry.identify(&r).unwrap(), Dialect::AggregateCaller);
    }

    #[test]
    fn test_identify_aggregate_without_samples() {
        let registry = HandlerRegistry::new();
        let r = parse(&[], "chr1\t10\t.\tN\t<DEL>\t.\tPASS\tEUK_CALLER=sniffles");
        assert_eq!(registry.identify(&r).unwrap(), Dialect::AggregateCaller);
    }

    #[test]
    fn test_identify_per_caller() {
        let registry = HandlerRegistry::new();
        let r = parse(
            &["delly", "manta"],
            "chr1\t10\t.\tN\t<DEL>\t.\tPASS\tSUPP_VEC=11\tGT\t0/1\t0/1",
        );
        assert_eq!(registry.identify(&r).unwrap(), Dialect::PerCallerGenotype);
    }

    #[test]
    fn test_identify_unresolvable() {
        let registry = HandlerRegistry::new();
        let r = parse(&["only"], "chr1\t10\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL\tGT\t0/1");

        match registry.identify(&r) {
            Err(SvLensError::DialectResolution { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected DialectResolution, got {:?}", other),
        }
    }

    #[test]
    fn test_handler_lookup() {
        let registry = HandlerRegistry::new();
        for dialect in Dialect::ALL {
            assert_eq!(registry.handler(dialect).dialect(), dialect);
        }
    }
}

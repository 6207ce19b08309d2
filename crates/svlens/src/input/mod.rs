//! Input parsing: call-file text to typed records.

mod compression;
mod genotype;
mod info;
mod parser;
mod record;
mod source;
mod stats_file;

pub use compression::{GZIP_MAGIC, InputStream, is_gzip};
pub use genotype::{parse_sample_genotype, percent_decode, percent_encode};
pub use info::{parse_info, reconstruct_info};
pub use parser::{
    DEFAULT_MAX_RECORDS, ParsedFile, ParserConfig, RecordStream, SkippedLine, VcfParser,
    parse_record,
};
pub use record::{
    FixedColumn, GenotypeMap, InfoMap, InfoValue, SampleGenotypes, VariantRecord,
    is_missing_value, locus_hint, normalize_svlen, parse_number,
};
pub use source::{FileHeader, SourceMetadata, content_hash};
pub use stats_file::{BcftoolsStats, SurvivorStats, parse_bcftools_stats, parse_survivor_stats};

//! Delimited-text export of record subsets.

use std::io::Write;

use crate::error::Result;
use crate::input::{FileHeader, InfoMap, VariantRecord, percent_encode, reconstruct_info};

const MISSING: &str = ".";

/// Render one record as a tab-separated data line (no newline).
///
/// Columns are written as they were read: QUAL, INFO and the sample
/// columns come from the record's raw text. INFO keys derived during
/// ingestion are appended after the original INFO text. Records without
/// raw sample text have their genotype blocks rebuilt in FORMAT key order,
/// with separators re-escaped.
pub fn record_to_line(record: &VariantRecord) -> String {
    let quality = record
        .raw_quality
        .clone()
        .or_else(|| record.quality.map(|q| q.to_string()))
        .unwrap_or_else(|| MISSING.to_string());

    let mut columns: Vec<String> = vec![
        record.chromosome.clone(),
        record.position.to_string(),
        record.id.clone().unwrap_or_else(|| MISSING.to_string()),
        record.reference.clone(),
        record.alternate.clone(),
        quality,
        record.filter_status.clone(),
        info_column(record),
    ];

    if record.genotypes.is_some() || !record.format_keys.is_empty() {
        columns.push(join_or_missing(record.format_keys.iter().map(String::as_str)));
    }
    if !record.raw_samples.is_empty() {
        columns.extend(record.raw_samples.iter().cloned());
    } else {
        for block in record.genotypes.iter().flat_map(|g| g.values()) {
            let values: Vec<String> = record
                .format_keys
                .iter()
                .map(|key| {
                    block
                        .get(key)
                        .map_or_else(|| MISSING.to_string(), |v| percent_encode(v).into_owned())
                })
                .collect();
            columns.push(join_or_missing(values.iter().map(String::as_str)));
        }
    }

    columns.join("\t")
}

/// Original INFO text followed by any derived keys.
fn info_column(record: &VariantRecord) -> String {
    let raw = record.raw_info.trim();
    if record.derived_info.is_empty() {
        return if raw.is_empty() {
            reconstruct_info(&record.info)
        } else {
            record.raw_info.clone()
        };
    }

    let derived: InfoMap = record
        .derived_info
        .iter()
        .filter_map(|key| record.info.get_key_value(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let derived = reconstruct_info(&derived);
    match (raw, derived.as_str()) {
        (_, MISSING) => record.raw_info.clone(),
        ("" | MISSING, _) => derived,
        _ => format!("{};{}", record.raw_info, derived),
    }
}

fn join_or_missing<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts.collect::<Vec<_>>().join(":");
    if joined.is_empty() {
        MISSING.to_string()
    } else {
        joined
    }
}

/// Write header lines followed by one line per record.
pub fn write_vcf<'a, W, I>(writer: &mut W, header: &FileHeader, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a VariantRecord>,
{
    for line in &header.header_meta {
        writeln!(writer, "{}", line)?;
    }
    if !header.column_header.is_empty() {
        writeln!(writer, "{}", header.column_header)?;
    }

    let mut written = 0;
    for record in records {
        writeln!(writer, "{}", record_to_line(record))?;
        written += 1;
    }
    Ok(written)
}

/// Render header and records as one string.
pub fn export_vcf<'a, I>(header: &FileHeader, records: I) -> String
where
    I: IntoIterator<Item = &'a VariantRecord>,
{
    let mut text = String::new();
    for line in &header.header_meta {
        text.push_str(line);
        text.push('\n');
    }
    if !header.column_header.is_empty() {
        text.push_str(&header.column_header);
        text.push('\n');
    }
    for record in records {
        text.push_str(&record_to_line(record));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InfoValue, VcfParser};

    const TEXT: &str = "##fileformat=VCFv4.2\n\
                        ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type\">\n\
                        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tdelly\tmanta\n\
                        chr1\t100\tsv1\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;PRECISE;SVLEN=-100\tGT:DR\t0/1:5\t./.:.\n\
                        chr2\t500\t.\tN\t<DUP>\t.\tLowQual\tSVTYPE=DUP\tGT:DR\t1/1:7\t0/1:3\n";

    #[test]
    fn test_export_is_lossless_for_plain_input() {
        let parsed = VcfParser::new().parse_str(TEXT).unwrap();
        let exported = export_vcf(&parsed.header, &parsed.records);
        assert_eq!(exported, TEXT);
    }

    #[test]
    fn test_write_vcf_counts_records() {
        let parsed = VcfParser::new().parse_str(TEXT).unwrap();
        let mut out = Vec::new();
        let written = write_vcf(&mut out, &parsed.header, parsed.records.iter().take(1)).unwrap();

        assert_eq!(written, 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_raw_columns_survive_export() {
        let line = "chr1\t5\t.\tN\t<DEL>\t30.50\tPASS\tSVTYPE=DEL;;A=1;A=2\tGT:DR:GQ\t0/1::7\t./.:DEL%2CDEL:.";
        let text = format!("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\ts2\n{}\n", line);
        let parsed = VcfParser::new().parse_str(&text).unwrap();
        assert_eq!(record_to_line(&parsed.records[0]), line);
    }

    #[test]
    fn test_derived_info_appended() {
        let parsed = VcfParser::new()
            .parse_str(
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                 chr1\t5\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;CALLER=delly\n\
                 chr1\t9\tdelly_INS\tN\t<INS>\t.\tPASS\t.\n",
            )
            .unwrap();
        let mut records = parsed.records.into_iter();

        let aggregated = records
            .next()
            .unwrap()
            .with_derived_info("SUPP_CALLERS", InfoValue::Text("delly,manta".to_string()));
        assert_eq!(
            record_to_line(&aggregated),
            "chr1\t5\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;CALLER=delly;SUPP_CALLERS=delly,manta"
        );

        let typed = records
            .next()
            .unwrap()
            .with_derived_info("SVTYPE", InfoValue::Text("INS".to_string()));
        assert!(record_to_line(&typed).ends_with("\tPASS\tSVTYPE=INS"));
    }

    #[test]
    fn test_rebuilt_genotypes_without_raw_text() {
        let parsed = VcfParser::new()
            .parse_str(
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n\
                 chr1\t5\t.\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL\tGT:ID\t0/1:a%3Ab\n",
            )
            .unwrap();
        let mut record = parsed.records[0].clone();
        record.raw_samples.clear();
        assert!(record_to_line(&record).ends_with("\t0/1:a%3Ab"));
    }

    #[test]
    fn test_empty_info_placeholder() {
        let parsed = VcfParser::new()
            .parse_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\nchr1\t5\t.\tA\tT\t.\tPASS\t.\n")
            .unwrap();
        assert_eq!(record_to_line(&parsed.records[0]), "chr1\t5\t.\tA\tT\t.\tPASS\t.");
    }
}

//! Statistics side-files that accompany call files.
//!
//! These feed display panels only; they never reach the variant store.

use std::io::Read;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SvLensError};

/// Section-tagged rows from a `bcftools stats` report, keyed by section
/// tag (`SN`, `TSTV`, `QUAL`, `IDD`, `ST`, `DP`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BcftoolsStats {
    pub sections: IndexMap<String, Vec<Vec<String>>>,
}

impl BcftoolsStats {
    /// Rows of a section, if present.
    pub fn section(&self, tag: &str) -> Option<&[Vec<String>]> {
        self.sections.get(tag).map(Vec::as_slice)
    }

    /// `SN` summary numbers as key/value pairs.
    pub fn summary_numbers(&self) -> IndexMap<String, String> {
        self.section("SN")
            .unwrap_or_default()
            .iter()
            .filter(|row| row.len() >= 3)
            .map(|row| (row[1].trim_end_matches(':').to_string(), row[2].clone()))
            .collect()
    }
}

/// Parse a `bcftools stats` report.
pub fn parse_bcftools_stats<R: Read>(reader: R) -> Result<BcftoolsStats> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .quoting(false)
        .from_reader(reader);

    let mut stats = BcftoolsStats::default();
    for result in csv_reader.records() {
        let record = result?;
        if record.len() < 2 {
            continue;
        }
        let row: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
        stats
            .sections
            .entry(record[0].to_string())
            .or_default()
            .push(row);
    }

    Ok(stats)
}

/// Tabular SURVIVOR stats: a header row and rows keyed by their first column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurvivorStats {
    pub columns: Vec<String>,
    pub rows: IndexMap<String, Vec<String>>,
}

impl SurvivorStats {
    /// Look up one cell by row key and column name.
    pub fn get(&self, row: &str, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// Parse a SURVIVOR stats table.
pub fn parse_survivor_stats<R: Read>(reader: R) -> Result<SurvivorStats> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(SvLensError::EmptyData("No columns in stats table".to_string()));
    }

    let mut rows = IndexMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let Some(key) = record.get(0) else {
            continue;
        };
        rows.insert(key.to_string(), record.iter().skip(1).map(str::to_string).collect());
    }

    Ok(SurvivorStats { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcftools_sections() {
        let text = "# This file was produced by bcftools stats\n\
                    SN\t0\tnumber of samples:\t1\n\
                    SN\t0\tnumber of records:\t42\n\
                    ST\t0\tother\t42\n";
        let stats = parse_bcftools_stats(text.as_bytes()).unwrap();

        assert_eq!(stats.section("SN").unwrap().len(), 2);
        assert_eq!(stats.section("ST").unwrap()[0], vec!["0", "other", "42"]);
        assert_eq!(stats.summary_numbers()["number of records"], "42");
        assert!(stats.section("QUAL").is_none());
    }

    #[test]
    fn test_survivor_table() {
        let text = "Len\tDel\tDup\tInv\n\
                    0-50bp\t10\t2\t0\n\
                    50-100bp\t4\t1\t1\n";
        let stats = parse_survivor_stats(text.as_bytes()).unwrap();

        assert_eq!(stats.columns, vec!["Del", "Dup", "Inv"]);
        assert_eq!(stats.get("0-50bp", "Del"), Some("10"));
        assert_eq!(stats.get("50-100bp", "Inv"), Some("1"));
        assert_eq!(stats.get("missing", "Del"), None);
    }
}

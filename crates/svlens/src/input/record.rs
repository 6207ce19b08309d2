//! Normalized variant record model.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Parsed INFO value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InfoValue {
    /// Bare key without `=`.
    Flag(bool),
    /// Value that coerced to a finite number. The original text is kept so
    /// re-serialization reproduces the input exactly.
    Number { value: f64, text: String },
    /// Anything else.
    Text(String),
}

impl InfoValue {
    /// Coerce a raw `KEY=VALUE` value, falling back to text.
    pub fn parse(raw: &str) -> Self {
        match parse_number(raw) {
            Some(value) => InfoValue::Number {
                value,
                text: raw.to_string(),
            },
            None => InfoValue::Text(raw.to_string()),
        }
    }

    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Textual value, as it would appear after `KEY=`.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            InfoValue::Flag(true) => Cow::Borrowed("true"),
            InfoValue::Flag(false) => Cow::Borrowed("false"),
            InfoValue::Number { text, .. } => Cow::Borrowed(text),
            InfoValue::Text(text) => Cow::Borrowed(text),
        }
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Ordered INFO key/value pairs.
pub type InfoMap = IndexMap<String, InfoValue>;

/// FORMAT key to value for one sample.
pub type GenotypeMap = IndexMap<String, String>;

/// Sample name to genotype block, in declared column order.
pub type SampleGenotypes = IndexMap<String, GenotypeMap>;

/// Fixed VCF columns exposed as fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixedColumn {
    Chromosome,
    Position,
    Id,
    Reference,
    Alternate,
    Quality,
    Filter,
}

impl FixedColumn {
    /// All fixed columns in file order.
    pub const ALL: [FixedColumn; 7] = [
        FixedColumn::Chromosome,
        FixedColumn::Position,
        FixedColumn::Id,
        FixedColumn::Reference,
        FixedColumn::Alternate,
        FixedColumn::Quality,
        FixedColumn::Filter,
    ];

    /// Field name used in metadata and predicates.
    pub fn name(&self) -> &'static str {
        match self {
            FixedColumn::Chromosome => "CHROM",
            FixedColumn::Position => "POS",
            FixedColumn::Id => "ID",
            FixedColumn::Reference => "REF",
            FixedColumn::Alternate => "ALT",
            FixedColumn::Quality => "QUAL",
            FixedColumn::Filter => "FILTER",
        }
    }

    /// Look up a fixed column by field name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// One structural-variant call.
///
/// Records are immutable once built; producing a corrected record means
/// building a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub chromosome: String,
    /// 1-based position.
    pub position: u64,
    pub id: Option<String>,
    pub reference: String,
    pub alternate: String,
    pub quality: Option<f64>,
    /// QUAL column exactly as read, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_quality: Option<String>,
    pub filter_status: String,
    pub info: InfoMap,
    /// INFO column exactly as read.
    pub raw_info: String,
    /// INFO keys added after parsing, such as an aggregated caller list.
    /// They are absent from `raw_info`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_info: Vec<String>,
    /// FORMAT keys in declared order (empty when the record has no samples).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format_keys: Vec<String>,
    pub genotypes: Option<SampleGenotypes>,
    /// Sample columns exactly as read, one per genotype block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_samples: Vec<String>,
    /// Display region, `chrom:start-end`.
    pub locus_hint: String,
    /// 1-based line number in the source text.
    pub source_line: usize,
}

impl VariantRecord {
    /// Identity triple `(chromosome, position, id)`.
    pub fn identity(&self) -> (&str, u64, Option<&str>) {
        (&self.chromosome, self.position, self.id.as_deref())
    }

    /// INFO value by key.
    pub fn info_value(&self, key: &str) -> Option<&InfoValue> {
        self.info.get(key)
    }

    /// INFO value as a number.
    pub fn info_f64(&self, key: &str) -> Option<f64> {
        self.info.get(key).and_then(InfoValue::as_f64)
    }

    /// INFO value as text, treating missing markers as absent.
    pub fn info_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.info
            .get(key)
            .map(InfoValue::as_text)
            .filter(|v| !is_missing_value(v))
    }

    /// `SVTYPE` INFO value.
    pub fn sv_type(&self) -> Option<Cow<'_, str>> {
        self.info_text("SVTYPE")
    }

    /// Absolute `SVLEN` of the first component.
    pub fn sv_len(&self) -> Option<u64> {
        normalize_svlen(&self.info_text("SVLEN")?)
    }

    /// Declared sample names, in column order.
    pub fn sample_names(&self) -> Vec<&str> {
        self.genotypes
            .as_ref()
            .map(|g| g.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of genotype blocks.
    pub fn sample_count(&self) -> usize {
        self.genotypes.as_ref().map_or(0, IndexMap::len)
    }

    /// Value of a fixed column, rendered as text.
    pub fn fixed_value(&self, column: FixedColumn) -> Option<Cow<'_, str>> {
        match column {
            FixedColumn::Chromosome => Some(Cow::Borrowed(&self.chromosome)),
            FixedColumn::Position => Some(Cow::Owned(self.position.to_string())),
            FixedColumn::Id => self.id.as_deref().map(Cow::Borrowed),
            FixedColumn::Reference => Some(Cow::Borrowed(&self.reference)),
            FixedColumn::Alternate => Some(Cow::Borrowed(&self.alternate)),
            FixedColumn::Quality => self
                .raw_quality
                .as_deref()
                .map(Cow::Borrowed)
                .or_else(|| self.quality.map(|q| Cow::Owned(q.to_string()))),
            FixedColumn::Filter => Some(Cow::Borrowed(&self.filter_status)),
        }
    }

    /// Resolve a field name against fixed columns, then INFO, then the
    /// given primary genotype block. FORMAT `ID` is never exposed.
    pub fn field_value<'a>(
        &'a self,
        name: &str,
        primary: Option<&'a GenotypeMap>,
    ) -> Option<Cow<'a, str>> {
        if let Some(column) = FixedColumn::from_name(name) {
            return self.fixed_value(column);
        }
        if let Some(value) = self.info.get(name) {
            return Some(value.as_text());
        }
        primary
            .and_then(|g| g.get(name))
            .map(|v| Cow::Borrowed(v.as_str()))
    }

    /// Copy of this record with `key` set to a value derived after parsing.
    /// An INFO key the record already carries is left untouched.
    pub fn with_derived_info(mut self, key: &str, value: InfoValue) -> Self {
        if !self.info.contains_key(key) {
            self.info.insert(key.to_string(), value);
            self.derived_info.push(key.to_string());
        }
        self
    }

    /// Rough in-memory footprint, used for ingestion progress.
    pub fn approx_size(&self) -> usize {
        let genotypes: usize = self
            .genotypes
            .iter()
            .flat_map(|g| g.iter())
            .map(|(name, block)| {
                name.len() + block.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>()
            })
            .sum();

        self.chromosome.len()
            + 8
            + self.id.as_ref().map_or(0, String::len)
            + self.reference.len()
            + self.alternate.len()
            + 8
            + self.filter_status.len()
            + self.raw_info.len()
            + self.raw_samples.iter().map(String::len).sum::<usize>()
            + self.locus_hint.len()
            + genotypes
    }
}

/// Build the display region for a call.
pub fn locus_hint(chromosome: &str, position: u64, info: &InfoMap) -> String {
    let end = info
        .get("END")
        .and_then(InfoValue::as_f64)
        .filter(|e| *e >= position as f64)
        .map_or(position, |e| e as u64);
    format!("{}:{}-{}", chromosome, position, end)
}

/// Check if a value represents a missing entry.
pub fn is_missing_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed == "."
        || trimmed == "-"
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
}

/// Parse a finite number.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Normalize an SVLEN value to the absolute integer of its first component.
pub fn normalize_svlen(raw: &str) -> Option<u64> {
    let first = raw.split(',').next()?.trim();
    let value = parse_number(first)?;
    Some(value.abs().trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing_value() {
        assert!(is_missing_value(""));
        assert!(is_missing_value("."));
        assert!(is_missing_value("NA"));
        assert!(is_missing_value("NaN"));
        assert!(is_missing_value("null"));
        assert!(!is_missing_value("0"));
        assert!(!is_missing_value("DEL"));
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("-1.5e3"), Some(-1500.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("DEL"), None);
    }

    #[test]
    fn test_normalize_svlen() {
        assert_eq!(normalize_svlen("-350"), Some(350));
        assert_eq!(normalize_svlen("120,80"), Some(120));
        assert_eq!(normalize_svlen("abc"), None);
    }

    #[test]
    fn test_info_value_keeps_text() {
        let v = InfoValue::parse("1.50");
        assert_eq!(v.as_f64(), Some(1.5));
        assert_eq!(v.to_string(), "1.50");
        assert_eq!(InfoValue::parse("DEL"), InfoValue::Text("DEL".to_string()));
    }

    #[test]
    fn test_derived_info_never_overrides() {
        let mut info = InfoMap::new();
        info.insert("SVTYPE".to_string(), InfoValue::parse("DEL"));
        let record = VariantRecord {
            chromosome: "chr1".to_string(),
            position: 10,
            id: None,
            reference: "N".to_string(),
            alternate: "<DEL>".to_string(),
            quality: Some(30.5),
            raw_quality: Some("30.50".to_string()),
            filter_status: "PASS".to_string(),
            info,
            raw_info: "SVTYPE=DEL".to_string(),
            derived_info: Vec::new(),
            format_keys: Vec::new(),
            genotypes: None,
            raw_samples: Vec::new(),
            locus_hint: "chr1:10-10".to_string(),
            source_line: 1,
        };

        let derived = record
            .with_derived_info("SVTYPE", InfoValue::parse("INS"))
            .with_derived_info("NUM_CALLERS", InfoValue::parse("2"));
        assert_eq!(derived.sv_type().unwrap(), "DEL");
        assert_eq!(derived.derived_info, vec!["NUM_CALLERS"]);
        assert_eq!(derived.fixed_value(FixedColumn::Quality).unwrap(), "30.50");
    }

    #[test]
    fn test_locus_hint_uses_end() {
        let mut info = InfoMap::new();
        info.insert("END".to_string(), InfoValue::parse("200"));
        assert_eq!(locus_hint("chr1", 100, &info), "chr1:100-200");
        assert_eq!(locus_hint("chr1", 100, &InfoMap::new()), "chr1:100-100");
    }
}

//! Per-sample genotype sub-parsing.

use std::borrow::Cow;

use tracing::warn;

use super::record::GenotypeMap;

/// Missing-value marker for absent trailing FORMAT values.
pub const MISSING: &str = ".";

/// Characters that would split a sample column apart if written raw.
const SAMPLE_RESERVED: [char; 5] = ['%', ':', '\t', '\n', '\r'];

/// Parse one sample column against the record's FORMAT keys.
///
/// Values are applied positionally; absent trailing values default to `.`,
/// while an empty value between separators stays empty. Percent-encoded
/// values are decoded, and a value that fails to decode is kept verbatim
/// with a warning.
pub fn parse_sample_genotype(sample_field: &str, format_keys: &[String]) -> GenotypeMap {
    let mut values = sample_field.split(':');
    let mut genotype = GenotypeMap::with_capacity(format_keys.len());

    for key in format_keys {
        let value = match values.next() {
            Some(v) => decode_value(key, v),
            None => MISSING.to_string(),
        };
        genotype.insert(key.clone(), value);
    }

    genotype
}

fn decode_value(key: &str, value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }
    match percent_decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(reason) => {
            warn!(key, value, %reason, "keeping undecodable genotype value as-is");
            value.to_string()
        }
    }
}

/// Decode `%XX` escapes into UTF-8 text.
///
/// Every `%` must start a two-digit hex escape; anything else is rejected
/// rather than passed through.
pub fn percent_decode(value: &str) -> std::result::Result<Cow<'_, str>, String> {
    if let Some(offset) = malformed_escape(value) {
        return Err(format!("bad escape at offset {}", offset));
    }
    urlencoding::decode(value).map_err(|e| format!("decoded bytes are not UTF-8: {}", e))
}

/// Escape a value for a sample column. Values without reserved characters
/// are returned unchanged.
pub fn percent_encode(value: &str) -> Cow<'_, str> {
    if value.contains(SAMPLE_RESERVED) {
        urlencoding::encode(value)
    } else {
        Cow::Borrowed(value)
    }
}

/// Offset of the first `%` not followed by two hex digits.
fn malformed_escape(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'%')
        .map(|(i, _)| i)
        .find(|&i| {
            !bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
        })
}

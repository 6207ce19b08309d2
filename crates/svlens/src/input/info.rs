//! INFO column parsing and reconstruction.

use super::record::{InfoMap, InfoValue};

/// Parse a semicolon-delimited INFO column.
///
/// Bare keys become `Flag(true)`; `KEY=VALUE` values are coerced to numbers
/// where possible. A lone `.` yields an empty map.
///
/// The map is keyed by INFO key: empty tokens (`A;;B`) are dropped and a
/// repeated key keeps its first position with the last value. The exact
/// column text lives in `VariantRecord::raw_info`, which export writes
/// back unchanged.
pub fn parse_info(raw: &str) -> InfoMap {
    let mut info = InfoMap::new();
    let raw = raw.trim();
    if raw.is_empty() || raw == "." {
        return info;
    }

    for token in raw.split(';') {
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((key, value)) => {
                info.insert(key.to_string(), InfoValue::parse(value));
            }
            None => {
                info.insert(token.to_string(), InfoValue::Flag(true));
            }
        }
    }

    info
}

/// Serialize INFO pairs back to column text.
///
/// `Flag(true)` becomes a bare key, `Flag(false)` is omitted, everything else
/// is `KEY=VALUE`. An empty result is `.`.
pub fn reconstruct_info(info: &InfoMap) -> String {
    let parts: Vec<String> = info
        .iter()
        .filter_map(|(key, value)| match value {
            InfoValue::Flag(true) => Some(key.clone()),
            InfoValue::Flag(false) => None,
            other => Some(format!("{}={}", key, other)),
        })
        .collect();

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join(";")
    }
}

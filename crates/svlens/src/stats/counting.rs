//! Grouping and counting.

use indexmap::IndexMap;

/// Occurrences of each distinct value, most frequent first. Ties keep
/// first-seen order.
pub fn value_counts<I, S>(values: I) -> IndexMap<String, usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for value in values {
        let value = value.as_ref();
        match counts.get_mut(value) {
            Some(count) => *count += 1,
            None => {
                counts.insert(value.to_string(), 1);
            }
        }
    }
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts
}

//! Storage encoding for task tags.
//!
//! Tags are a set of strings in memory and a JSON array string in storage
//! (e.g. `["q3","urgent"]`). Decoding never fails: an absent, empty or
//! malformed value yields the empty set.

use std::collections::BTreeSet;

/// Encodes a tag set as a JSON array string, in sorted order.
#[must_use]
pub fn encode(tags: &BTreeSet<String>) -> String {
    // A list of strings always serializes.
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a stored tag string into a set.
///
/// Blank tags are discarded and surrounding whitespace is trimmed.
#[must_use]
pub fn decode(encoded: Option<&str>) -> BTreeSet<String> {
    let Some(raw) = encoded.map(str::trim).filter(|s| !s.is_empty()) else {
        return BTreeSet::new();
    };
    serde_json::from_str::<Vec<String>>(raw)
        .map(|list| {
            list.into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

//! Ranked entries produced by user-dictionary lookups.

use std::cmp::Ordering;

use serde::Serialize;

use crate::graph::SyllableId;

/// A phonetic code: the sequence of syllable ids spelling an entry.
pub type Code = Vec<SyllableId>;

/// One ranked lookup result.
///
/// Entries are created fresh per lookup and not mutated afterwards.
/// `weight` is a log-scale score, comparable only within one lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DictEntry {
    pub text: String,
    pub code: Code,
    /// Raw code string actually matched, trailing space retained, so the
    /// entry can be committed back under the exact stored key.
    pub custom_code: String,
    pub weight: f64,
    pub commit_count: i32,
    /// Rendering hint for partial matches, e.g. `"~ao"`.
    pub comment: String,
    /// How much stored code exceeds the consumed input.
    pub remaining_code_length: usize,
}

/// Sorts `entries[start..start + count]` by descending weight, stable in
/// insertion order. Out-of-range bounds are clamped.
pub fn sort_range_by_weight(entries: &mut [DictEntry], start: usize, count: usize) {
    if start >= entries.len() {
        return;
    }
    let end = entries.len().min(start.saturating_add(count));
    entries[start..end].sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
}

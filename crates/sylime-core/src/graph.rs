//! Syllable-graph input types.
//!
//! A syllable graph is produced by an external syllabifier; this engine only
//! consumes it. `indices` groups the outgoing edges of every start position
//! by syllable id, and the id order must match the lexicographic order of
//! the spellings in the store: the DFS lookup relies on that to keep its
//! cursor scanning forward.

use std::collections::BTreeMap;

/// Identifier of a syllable in the attached syllabary.
pub type SyllableId = u32;

/// How a spelling maps onto a syllable, strongest interpretation first.
/// The DFS skips `Abbreviation` and weaker variants unless they are the
/// only interpretation of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpellingType {
    #[default]
    Normal,
    Fuzzy,
    Abbreviation,
    Completion,
}

/// One spelling interpretation of an edge.
#[derive(Debug, Clone)]
pub struct SpellingProperties {
    pub kind: SpellingType,
    /// Input position this interpretation ends at.
    pub end_pos: usize,
    /// Additive log-scale ranking bias for this interpretation.
    pub credibility: f64,
}

/// Outgoing edges of one position: syllable id to its spelling variants.
pub type SpellingIndex = BTreeMap<SyllableId, Vec<SpellingProperties>>;

#[derive(Debug, Clone, Default)]
pub struct SyllableGraph {
    pub input_length: usize,
    /// Length of the input prefix that was successfully syllabified.
    pub interpreted_length: usize,
    pub indices: BTreeMap<usize, SpellingIndex>,
}

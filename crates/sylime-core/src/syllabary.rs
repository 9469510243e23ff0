//! The static-dictionary boundary: translating syllable ids to spellings.

use crate::graph::SyllableId;

/// Read-only source of syllable spellings, shared between the session and
/// the user dictionary. Implementations must assign ids in the same
/// lexicographic order as their spellings sort, matching user-db key order.
pub trait Syllabary: Send + Sync {
    /// The spelling for `id`; `None` when the id is unknown.
    fn syllable(&self, id: SyllableId) -> Option<&str>;
}

/// In-memory syllabary backed by a sorted spelling table.
pub struct StaticSyllabary {
    spellings: Vec<String>,
}

impl StaticSyllabary {
    /// Builds a syllabary from arbitrary spellings; ids are assigned in
    /// lexicographic order after sorting and deduplication.
    pub fn new<I, S>(spellings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spellings: Vec<String> = spellings.into_iter().map(Into::into).collect();
        spellings.sort();
        spellings.dedup();
        Self { spellings }
    }

    /// Id of `spelling`, when present.
    pub fn id_of(&self, spelling: &str) -> Option<SyllableId> {
        self.spellings
            .binary_search_by(|s| s.as_str().cmp(spelling))
            .ok()
            .map(|i| i as SyllableId)
    }

    pub fn len(&self) -> usize {
        self.spellings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spellings.is_empty()
    }
}

impl Syllabary for StaticSyllabary {
    fn syllable(&self, id: SyllableId) -> Option<&str> {
        self.spellings.get(id as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_lexicographic_order() {
        let syl = StaticSyllabary::new(["hao", "ni", "an", "ni"]);
        assert_eq!(syl.len(), 3);
        assert_eq!(syl.syllable(0), Some("an"));
        assert_eq!(syl.syllable(1), Some("hao"));
        assert_eq!(syl.syllable(2), Some("ni"));
        assert_eq!(syl.id_of("ni"), Some(2));
        assert_eq!(syl.id_of("zzz"), None);
        assert_eq!(syl.syllable(9), None);
    }
}

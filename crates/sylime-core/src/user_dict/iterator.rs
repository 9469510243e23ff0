//! Buffered iteration over lookup results.

use std::collections::BTreeMap;

use crate::entry::{sort_range_by_weight, DictEntry};

/// Predicate deciding whether an entry stays visible. Filters compose
/// with AND.
pub type DictEntryFilter = Box<dyn Fn(&DictEntry) -> bool>;

/// Entries recruited during a lookup, keyed by the input position where
/// each entry's code ends.
pub type UserDictEntryCollector = BTreeMap<usize, UserDictEntryIterator>;

/// A cursor over a buffered entry list, with optional filtering.
///
/// The cursor always rests on a visible entry (or past the end), so
/// `peek` never has to scan.
#[derive(Default)]
pub struct UserDictEntryIterator {
    entries: Vec<DictEntry>,
    index: usize,
    filter: Option<DictEntryFilter>,
}

impl UserDictEntryIterator {
    pub fn add(&mut self, entry: DictEntry) {
        self.entries.push(entry);
        self.skip_rejected();
    }

    pub fn sort_range(&mut self, start: usize, count: usize) {
        sort_range_by_weight(&mut self.entries, start, count);
    }

    /// Narrow the visible set. The cursor moves forward if the entry it
    /// rests on is no longer visible.
    pub fn add_filter(&mut self, filter: DictEntryFilter) {
        self.filter = Some(match self.filter.take() {
            Some(prior) => Box::new(move |entry| prior(entry) && filter(entry)),
            None => filter,
        });
        self.skip_rejected();
    }

    pub fn peek(&self) -> Option<&DictEntry> {
        self.entries.get(self.index)
    }

    /// Step past the current entry. Returns whether an entry remains.
    pub fn advance(&mut self) -> bool {
        if self.index < self.entries.len() {
            self.index += 1;
        }
        self.skip_rejected();
        !self.exhausted()
    }

    pub fn exhausted(&self) -> bool {
        self.index >= self.entries.len()
    }

    /// Rewind to the first visible entry.
    pub fn reset(&mut self) {
        self.index = 0;
        self.skip_rejected();
    }

    /// Keep only the highest-weight entry at or after `start`, first
    /// one winning ties. The cursor moves back to `start` if it was
    /// inside the collapsed range.
    pub fn collapse_range(&mut self, start: usize) {
        if self.entries.len() <= start + 1 {
            return;
        }
        let mut best = start;
        for i in start + 1..self.entries.len() {
            if self.entries[best].weight < self.entries[i].weight {
                best = i;
            }
        }
        let kept = self.entries.remove(best);
        self.entries.truncate(start);
        self.entries.push(kept);
        self.index = self.index.min(start);
        self.skip_rejected();
    }

    /// Move the entry with the given text to the front of the range
    /// starting at `start`, keeping the order of the others.
    pub fn promote(&mut self, start: usize, text: &str) -> bool {
        let Some(pos) = self
            .entries
            .get(start..)
            .and_then(|range| range.iter().position(|e| e.text == text))
        else {
            return false;
        };
        let entry = self.entries.remove(start + pos);
        self.entries.insert(start, entry);
        true
    }

    /// Hand the buffered entries over, leaving the iterator empty. The
    /// filter stays in place.
    pub fn release(&mut self) -> Vec<DictEntry> {
        self.index = 0;
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn skip_rejected(&mut self) {
        if let Some(filter) = &self.filter {
            while self
                .entries
                .get(self.index)
                .is_some_and(|entry| !filter(entry))
            {
                self.index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, weight: f64) -> DictEntry {
        DictEntry {
            text: text.to_string(),
            weight,
            ..Default::default()
        }
    }

    #[test]
    fn advance_walks_all_entries() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("a", 0.0));
        it.add(entry("b", 0.0));
        assert_eq!(it.peek().unwrap().text, "a");
        assert!(it.advance());
        assert_eq!(it.peek().unwrap().text, "b");
        assert!(!it.advance());
        assert!(it.exhausted());
        assert_eq!(it.peek(), None);
    }

    #[test]
    fn filters_compose_and_skip_eagerly() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("keep", 0.0));
        it.add(entry("drop", 0.0));
        it.add(entry("keep too", 0.0));
        it.add_filter(Box::new(|e| !e.text.starts_with("drop")));
        assert_eq!(it.peek().unwrap().text, "keep");
        assert!(it.advance());
        assert_eq!(it.peek().unwrap().text, "keep too");

        it.reset();
        it.add_filter(Box::new(|e| e.text == "keep"));
        assert_eq!(it.peek().unwrap().text, "keep");
        assert!(!it.advance());
    }

    #[test]
    fn filter_can_exhaust_from_the_front() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("x", 0.0));
        it.add_filter(Box::new(|_| false));
        assert!(it.exhausted());
        assert_eq!(it.peek(), None);
    }

    #[test]
    fn collapse_range_keeps_first_best() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("before", 9.0));
        it.add(entry("weak", 1.0));
        it.add(entry("strong", 3.0));
        it.add(entry("strong twin", 3.0));
        it.collapse_range(1);
        assert_eq!(it.len(), 2);
        assert_eq!(it.peek().unwrap().text, "before");
        it.advance();
        assert_eq!(it.peek().unwrap().text, "strong");
    }

    #[test]
    fn promote_moves_entry_to_range_front() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("a", 3.0));
        it.add(entry("b", 2.0));
        it.add(entry("c", 1.0));
        assert!(it.promote(0, "c"));
        assert_eq!(it.peek().unwrap().text, "c");
        assert!(!it.promote(0, "missing"));
        assert!(!it.promote(9, "a"));
    }

    #[test]
    fn release_empties_the_buffer() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("a", 1.0));
        it.add(entry("b", 2.0));
        let taken = it.release();
        assert_eq!(taken.len(), 2);
        assert!(it.is_empty());
        assert!(it.exhausted());
    }

    #[test]
    fn sort_range_orders_by_weight_and_keeps_ties_stable() {
        let mut it = UserDictEntryIterator::default();
        it.add(entry("low", 1.0));
        it.add(entry("first tie", 5.0));
        it.add(entry("second tie", 5.0));
        it.sort_range(0, 3);
        assert_eq!(it.peek().unwrap().text, "first tie");
        it.advance();
        assert_eq!(it.peek().unwrap().text, "second tie");
        it.advance();
        assert_eq!(it.peek().unwrap().text, "low");
    }
}

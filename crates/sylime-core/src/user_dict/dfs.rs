//! Depth-first lookup over a syllable graph.
//!
//! One store cursor is threaded through the whole search. Edges are
//! visited in syllable id order, which matches the store's key order,
//! so the cursor only ever moves forward and each matching record is
//! read once.

use tracing::debug;

use crate::db::DbCursor;
use crate::entry::Code;
use crate::graph::{SpellingType, SyllableGraph};
use crate::syllabary::Syllabary;

use super::iterator::UserDictEntryCollector;

pub(super) struct DfsState {
    cursor: Box<dyn DbCursor>,
    pub(super) depth_limit: usize,
    present_tick: u64,
    pub(super) code: Code,
    pub(super) credibility: Vec<f64>,
    collector: UserDictEntryCollector,
    pub(super) key: String,
    value: String,
}

impl DfsState {
    pub(super) fn new(
        cursor: Box<dyn DbCursor>,
        depth_limit: usize,
        present_tick: u64,
        initial_credibility: f64,
    ) -> Self {
        Self {
            cursor,
            depth_limit,
            present_tick,
            code: Code::new(),
            credibility: vec![initial_credibility],
            collector: UserDictEntryCollector::new(),
            key: String::new(),
            value: String::new(),
        }
    }

    pub(super) fn into_collector(self) -> UserDictEntryCollector {
        self.collector
    }

    pub(super) fn next_entry(&mut self) -> bool {
        match self.cursor.next_record() {
            Some((key, value)) => {
                self.key = key;
                self.value = value;
                true
            }
            None => {
                self.key.clear();
                self.value.clear();
                false
            }
        }
    }

    pub(super) fn forward_scan(&mut self, prefix: &str) -> bool {
        if !self.cursor.jump(prefix) {
            return false;
        }
        self.next_entry()
    }

    pub(super) fn is_exact_match(&self, prefix: &str) -> bool {
        self.key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('\t'))
    }

    pub(super) fn is_prefix_match(&self, prefix: &str) -> bool {
        self.key.starts_with(prefix)
    }

    pub(super) fn recruit_entry(&mut self, end_pos: usize) {
        let credibility = self.credibility.last().copied().unwrap_or(0.0);
        let Some(mut entry) =
            super::create_dict_entry(&self.key, &self.value, self.present_tick, credibility)
        else {
            return;
        };
        entry.code = self.code.clone();
        debug!(end_pos, text = %entry.text, "entry recruited");
        self.collector.entry(end_pos).or_default().add(entry);
    }
}

pub(super) fn dfs_lookup(
    state: &mut DfsState,
    syllabary: &dyn Syllabary,
    graph: &SyllableGraph,
    current_pos: usize,
    current_prefix: &str,
) {
    let Some(index) = graph.indices.get(&current_pos) else {
        return;
    };
    debug!(current_pos, "dfs lookup");
    for (&syllable_id, spellings) in index {
        state.code.push(syllable_id);
        'edge: {
            let Some(prefix) = super::translate_code(syllabary, &state.code) else {
                break 'edge;
            };
            for (i, props) in spellings.iter().enumerate() {
                // beyond the first spelling, only unabbreviated forms count
                if i > 0 && props.kind >= SpellingType::Abbreviation {
                    continue;
                }
                let cumulative =
                    state.credibility.last().copied().unwrap_or(0.0) + props.credibility;
                state.credibility.push(cumulative);
                'variant: {
                    let end_pos = props.end_pos;
                    if prefix != state.key {
                        // cursor sits at e.g. 'ni \tNi' while the prefix grew to 'ni hao '
                        if !state.forward_scan(&prefix) {
                            break 'variant; // nothing at or past 'ni hao '
                        }
                    }
                    while state.is_exact_match(&prefix) {
                        // 'ni hao ' against 'ni hao \tNihao'
                        state.recruit_entry(end_pos);
                        state.next_entry(); // 'ni hao \tNeehow'
                    }
                    if (state.depth_limit == 0 || state.code.len() < state.depth_limit)
                        && state.is_prefix_match(&prefix)
                    {
                        // 'ni hao ' against 'ni hao ma \tNihaoma'
                        dfs_lookup(state, syllabary, graph, end_pos, &prefix);
                    }
                }
                state.credibility.pop();
            }
        }
        state.code.pop();
        if !state.is_prefix_match(current_prefix) {
            // cursor ran past every key under this prefix; sibling
            // syllables sort later still and cannot match either
            return;
        }
    }
}

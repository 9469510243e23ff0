//! Sequential prefix scan with resume paging.
//!
//! Unlike the graph lookup, this path takes the raw typed code and
//! walks the store in key order, classifying each record as an exact
//! match (the stored code extends the input by whole syllables) or a
//! predictive completion. Callers page through large result sets by
//! passing the resume key back in.

use std::collections::BTreeMap;

use tracing::debug;

use crate::db::Db;
use crate::settings::DictSettings;

use super::codec;
use super::iterator::UserDictEntryIterator;

/// Resume sentinel ordering after every storable key; handed back once
/// a scan has no further records so the caller stops paging.
pub const SCAN_END: &str = "\u{10ffff}";

/// Knobs shaping a scan, resolved from settings once at construction.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Query the store by only this many leading characters of the
    /// input, letting the match test pick through a wider key range.
    pub query_window: Option<usize>,
    /// Lowercase the input before scanning.
    pub fold_case: bool,
    /// Skip entries whose text runs longer than this many characters.
    pub max_text_chars: Option<usize>,
    /// Collapse everything a scan adds into its single best entry.
    pub single_slot: bool,
    /// Credibility applied to every entry this scan creates.
    pub credibility: f64,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            query_window: None,
            fold_case: false,
            max_text_chars: None,
            single_slot: false,
            credibility: 1.0,
        }
    }
}

impl ScanPolicy {
    pub fn from_settings(settings: &DictSettings) -> Self {
        Self {
            query_window: settings.scan.query_window,
            fold_case: settings.scan.fold_case,
            max_text_chars: settings.scan.max_text_chars,
            single_slot: settings.scan.single_slot,
            credibility: settings.scan.credibility,
        }
    }
}

/// Remembered winning texts per input length, owned by the caller and
/// fed back into cached scans so the last pick surfaces first.
#[derive(Debug, Default)]
pub struct RankingCache {
    winners: BTreeMap<usize, String>,
}

impl RankingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `text` as the pick made after `input_len` bytes of code.
    pub fn record_winner(&mut self, input_len: usize, text: impl Into<String>) {
        self.winners.insert(input_len, text.into());
    }

    pub fn winner(&self, input_len: usize) -> Option<&str> {
        self.winners.get(&input_len).map(String::as_str)
    }

    /// Drop every remembered pick of `text`, e.g. once it is deleted.
    pub fn forget(&mut self, text: &str) {
        self.winners.retain(|_, winner| winner != text);
    }

    pub fn clear(&mut self) {
        self.winners.clear();
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn scan_words(
    db: &dyn Db,
    present_tick: u64,
    policy: &ScanPolicy,
    result: &mut UserDictEntryIterator,
    input: &str,
    predictive: bool,
    limit: usize,
    mut resume_key: Option<&mut String>,
) -> usize {
    let folded;
    let input = if policy.fold_case {
        folded = input.to_lowercase();
        folded.as_str()
    } else {
        input
    };
    let len = input.len();
    let start = result.len();
    let mut count = 0usize;
    let mut exact_match_count = 0usize;
    let mut key = String::new();
    let mut value = String::new();

    let cursor = db.query(query_prefix(input, policy));
    let mut cursor = match cursor {
        Some(cursor) if !cursor.exhausted() => cursor,
        _ => {
            if let Some(resume) = resume_key {
                *resume = SCAN_END.to_owned();
            }
            return 0;
        }
    };
    if let Some(resume) = resume_key.as_deref_mut() {
        if !resume.is_empty() {
            // reposition past the record the previous page ended on
            let resumed = cursor.jump(resume)
                && match cursor.next_record() {
                    Some((k, v)) => {
                        key = k;
                        value = v;
                        true
                    }
                    None => false,
                };
            if !resumed {
                *resume = SCAN_END.to_owned();
                return 0;
            }
            debug!(after = %key, "resume scan");
        }
    }
    let mut last_key = key.clone();
    while let Some((k, v)) = cursor.next_record() {
        key = k;
        value = v;
        // exact: the stored code continues with a syllable boundary
        let is_exact_match = len < key.len() && key.as_bytes()[len] == b' ';
        if !is_exact_match && !predictive {
            key = last_key;
            break;
        }
        last_key = key.clone();
        let Some(mut entry) =
            super::create_dict_entry(&key, &value, present_tick, policy.credibility)
        else {
            continue;
        };
        let Some((full_code, _)) = codec::split_key(&key) else {
            continue;
        };
        // keep the trailing space so a commit hits the stored key
        entry.custom_code = full_code.to_string();
        let trimmed = full_code.trim_end();
        if trimmed.len() > len {
            if let Some(rest) = trimmed.get(len..) {
                entry.comment = format!("~{rest}");
                entry.remaining_code_length = trimmed.len() - len;
            }
        }
        if policy
            .max_text_chars
            .is_some_and(|max| entry.text.chars().count() > max)
        {
            continue;
        }
        result.add(entry);
        count += 1;
        if is_exact_match {
            exact_match_count += 1;
        } else if limit != 0 && count >= limit {
            break;
        }
    }
    if policy.single_slot && count > 0 {
        result.collapse_range(start);
        count = 1;
    }
    if exact_match_count > 0 {
        result.sort_range(start, exact_match_count);
    }
    if let Some(resume) = resume_key {
        *resume = key;
    }
    count
}

/// `scan_words`, then move the remembered winner for this input length
/// to the front of the freshly added range.
#[allow(clippy::too_many_arguments)]
pub(super) fn scan_words_cached(
    db: &dyn Db,
    present_tick: u64,
    policy: &ScanPolicy,
    result: &mut UserDictEntryIterator,
    input: &str,
    predictive: bool,
    limit: usize,
    resume_key: Option<&mut String>,
    cache: &RankingCache,
) -> usize {
    let count = scan_words(
        db,
        present_tick,
        policy,
        result,
        input,
        predictive,
        limit,
        resume_key,
    );
    if count == 0 {
        return 0;
    }
    let start = result.len() - count;
    if let Some(winner) = cache.winner(input.len()) {
        if result.promote(start, winner) {
            debug!(winner, input, "remembered winner promoted");
        }
    }
    count
}

fn query_prefix<'a>(input: &'a str, policy: &ScanPolicy) -> &'a str {
    match policy.query_window {
        Some(window) => input
            .char_indices()
            .nth(window)
            .map_or(input, |(end, _)| &input[..end]),
        None => input,
    }
}

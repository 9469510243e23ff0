//! User dictionary engine.
//!
//! Remembers phrases the user has produced, keyed by phonetic code,
//! and ranks them by a tick-decayed commit score. Retrieval runs
//! either as a depth-first search over a syllable graph riding one
//! forward store cursor, or as a flat prefix scan for incremental
//! typing. Learning writes go through a short transaction protocol so
//! an immediate correction can undo the last commit.


pub mod codec;
mod dfs;
mod iterator;
mod scan;
mod scoring;

pub use iterator::{DictEntryFilter, UserDictEntryCollector, UserDictEntryIterator};
pub use scan::{RankingCache, ScanPolicy, SCAN_END};

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, debug_span, warn};

use crate::db::Db;
use crate::entry::{Code, DictEntry};
use crate::graph::SyllableGraph;
use crate::maintenance::RecoveryService;
use crate::settings::DictSettings;
use crate::syllabary::Syllabary;

use codec::UserDbValue;
use dfs::DfsState;

/// Metadata key holding the global tick.
const TICK_KEY: &str = "/tick";
/// How long after `new_transaction` a revert is still honored.
const REVERT_WINDOW: Duration = Duration::from_secs(3);
/// Signal folded into `dee` by a passive refresh.
const REFRESH_SIGNAL: f64 = 0.1;

pub struct UserDictionary {
    name: String,
    db: Arc<dyn Db>,
    syllabary: Option<Weak<dyn Syllabary>>,
    tick: u64,
    transaction_time: Option<Instant>,
    delete_threshold: u64,
    scan_policy: ScanPolicy,
    recovery: Option<Arc<RecoveryService>>,
}

impl UserDictionary {
    pub fn new(name: impl Into<String>, db: Arc<dyn Db>, settings: &DictSettings) -> Self {
        Self {
            name: name.into(),
            db,
            syllabary: None,
            tick: 0,
            transaction_time: None,
            delete_threshold: settings.delete_threshold.max(0) as u64,
            scan_policy: ScanPolicy::from_settings(settings),
            recovery: None,
        }
    }

    /// Attach the syllabary used to translate codes back to spelling
    /// strings. The engine keeps a non-owning handle and fails lookups
    /// gracefully once the owner drops it.
    pub fn attach(&mut self, syllabary: Weak<dyn Syllabary>) {
        self.syllabary = Some(syllabary);
    }

    pub fn set_recovery_service(&mut self, service: Arc<RecoveryService>) {
        self.recovery = Some(service);
    }

    /// Open the store and pick up the persisted tick. When the store
    /// cannot open, a repair is handed to the maintenance thread and
    /// this load fails; a later one finds the repaired store.
    pub fn load(&mut self) -> bool {
        if !self.db.loaded() && !self.db.open() {
            if let (Some(service), Some(_)) = (&self.recovery, self.db.as_recoverable()) {
                service.schedule(Arc::clone(&self.db));
            }
            return false;
        }
        if !self.fetch_tick_count() && !self.initialize() {
            return false;
        }
        debug!(dict = %self.name, tick = self.tick, "user dictionary loaded");
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn delete_threshold(&self) -> u64 {
        self.delete_threshold
    }

    pub fn scan_policy(&self) -> &ScanPolicy {
        &self.scan_policy
    }

    pub fn loaded(&self) -> bool {
        !self.db.disabled() && self.db.loaded()
    }

    pub fn readonly(&self) -> bool {
        self.db.readonly()
    }

    /// Collect every stored phrase matching a path through `graph`
    /// from `start_pos`, bucketed by end position. Returns `None` when
    /// the engine is not ready or nothing matches.
    pub fn lookup(
        &mut self,
        graph: &SyllableGraph,
        start_pos: usize,
        depth_limit: usize,
        initial_credibility: f64,
    ) -> Option<UserDictEntryCollector> {
        let _span = debug_span!("lookup", start_pos, depth_limit).entered();
        let syllabary = self.syllabary()?;
        if !self.loaded() || start_pos >= graph.interpreted_length {
            return None;
        }
        self.fetch_tick_count();
        let mut cursor = self.db.query("")?;
        cursor.jump(" "); // skip the legacy tick record
        let mut state = DfsState::new(cursor, depth_limit, self.tick + 1, initial_credibility);
        dfs::dfs_lookup(&mut state, syllabary.as_ref(), graph, start_pos, "");
        let mut collector = state.into_collector();
        if collector.is_empty() {
            return None;
        }
        for bucket in collector.values_mut() {
            let len = bucket.len();
            bucket.sort_range(0, len);
        }
        Some(collector)
    }

    /// Flat prefix scan for incremental typing; see the scan module
    /// for the policy knobs and resume protocol.
    pub fn lookup_words(
        &self,
        result: &mut UserDictEntryIterator,
        input: &str,
        predictive: bool,
        limit: usize,
        resume_key: Option<&mut String>,
    ) -> usize {
        let _span = debug_span!("lookup_words", input, predictive, limit).entered();
        scan::scan_words(
            self.db.as_ref(),
            self.tick + 1,
            &self.scan_policy,
            result,
            input,
            predictive,
            limit,
            resume_key,
        )
    }

    /// Like `lookup_words`, additionally moving the remembered winner
    /// for this input length to the front of the added range.
    pub fn lookup_words_cached(
        &self,
        result: &mut UserDictEntryIterator,
        input: &str,
        predictive: bool,
        limit: usize,
        resume_key: Option<&mut String>,
        cache: &RankingCache,
    ) -> usize {
        scan::scan_words_cached(
            self.db.as_ref(),
            self.tick + 1,
            &self.scan_policy,
            result,
            input,
            predictive,
            limit,
            resume_key,
            cache,
        )
    }

    pub fn update_entry(&mut self, entry: &DictEntry, commits: i32) -> bool {
        self.update_entry_with_prefix(entry, commits, "")
    }

    /// The write path for learning. With a nonempty `new_entry_prefix`
    /// only brand-new keys are written, namespaced under the prefix;
    /// existing live entries are left untouched.
    pub fn update_entry_with_prefix(
        &mut self,
        entry: &DictEntry,
        commits: i32,
        new_entry_prefix: &str,
    ) -> bool {
        let Some(mut key) = self.entry_key(entry) else {
            return false;
        };
        let mut v = UserDbValue::default();
        match self.db.fetch(&key) {
            Some(value) => {
                v = UserDbValue::unpack(&value).unwrap_or_default();
                if v.tick > self.tick {
                    v.tick = self.tick; // fix abnormal timestamp
                }
                if v.commits < 0 {
                    v.commits = -v.commits;
                } else if !new_entry_prefix.is_empty() {
                    // prefixed writes never reinforce existing entries
                    return false;
                }
            }
            None => {
                if !new_entry_prefix.is_empty() {
                    key.insert_str(0, new_entry_prefix);
                }
            }
        }
        if commits > 0 {
            if v.commits < 0 {
                v.commits = -v.commits; // revive a deleted entry
            }
            v.commits += commits;
            self.update_tick_count(1);
            v.dee = scoring::decay(commits as f64, self.tick, v.dee, v.tick);
        } else if commits == 0 {
            v.dee = scoring::decay(REFRESH_SIGNAL, self.tick, v.dee, v.tick);
        } else {
            v.commits = (-v.commits).min(-1); // mark as deleted
            v.dee = scoring::decay(0.0, self.tick, v.dee, v.tick);
        }
        v.tick = self.tick;
        self.db.update(&key, &v.pack())
    }

    /// Tombstone an entry, but only once it has gone unused for at
    /// least `delete_threshold` ticks. A threshold of zero disables
    /// automatic deletion entirely.
    pub fn delete_entry(&mut self, entry: &DictEntry) -> bool {
        if self.delete_threshold == 0 {
            return false;
        }
        let Some(key) = self.entry_key(entry) else {
            return false;
        };
        let Some(value) = self.db.fetch(&key) else {
            return false;
        };
        let mut v = UserDbValue::unpack(&value).unwrap_or_default();
        if self.tick.saturating_sub(v.tick) < self.delete_threshold {
            return false;
        }
        v.commits = -1;
        v.dee = scoring::decay(0.0, self.tick, v.dee, v.tick);
        self.db.update(&key, &v.pack())
    }

    /// The only place the global tick advances. A failed persist keeps
    /// the in-memory counter; the stored tick is authoritative on the
    /// next load.
    pub fn update_tick_count(&mut self, increment: u64) -> bool {
        self.tick += increment;
        let persisted = self.db.meta_update(TICK_KEY, &self.tick.to_string());
        if !persisted {
            warn!(dict = %self.name, tick = self.tick, "failed to persist tick");
        }
        persisted
    }

    /// Begin a transaction, force-committing any pending one first.
    pub fn new_transaction(&mut self) -> bool {
        let db = Arc::clone(&self.db);
        let Some(txn) = db.as_transactional() else {
            return false;
        };
        self.commit_pending_transaction();
        self.transaction_time = Some(Instant::now());
        txn.begin_transaction()
    }

    /// Abort the pending transaction, but only within a short window
    /// after it began. Past the window this is a no-op, so a slow
    /// unrelated operation cannot be discarded by a late correction.
    pub fn revert_recent_transaction(&mut self) -> bool {
        let Some(txn) = self.db.as_transactional() else {
            return false;
        };
        if !txn.in_transaction() {
            return false;
        }
        if !self
            .transaction_time
            .is_some_and(|began| began.elapsed() <= REVERT_WINDOW)
        {
            return false;
        }
        txn.abort_transaction()
    }

    pub fn commit_pending_transaction(&mut self) -> bool {
        match self.db.as_transactional() {
            Some(txn) if txn.in_transaction() => txn.commit_transaction(),
            _ => false,
        }
    }

    fn syllabary(&self) -> Option<Arc<dyn Syllabary>> {
        self.syllabary.as_ref()?.upgrade()
    }

    fn entry_key(&self, entry: &DictEntry) -> Option<String> {
        let code_str = if entry.custom_code.is_empty() {
            translate_code(self.syllabary()?.as_ref(), &entry.code)?
        } else {
            entry.custom_code.clone()
        };
        Some(codec::build_key(&code_str, &entry.text))
    }

    fn initialize(&mut self) -> bool {
        self.db.meta_update(TICK_KEY, "0")
    }

    /// An earlier format wrote the tick into an empty data key; fall
    /// back to it when the metadata key is absent. A value that fails
    /// to parse leaves the in-memory tick untouched.
    fn fetch_tick_count(&mut self) -> bool {
        let Some(value) = self
            .db
            .meta_fetch(TICK_KEY)
            .or_else(|| self.db.fetch(""))
        else {
            return false;
        };
        match value.parse() {
            Ok(tick) => {
                self.tick = tick;
                true
            }
            Err(_) => false,
        }
    }

    #[cfg(test)]
    fn backdate_transaction(&mut self, by: Duration) {
        self.transaction_time = self
            .transaction_time
            .map(|began| began.checked_sub(by).unwrap_or(began));
    }
}

impl Drop for UserDictionary {
    fn drop(&mut self) {
        if self.loaded() {
            self.commit_pending_transaction();
        }
    }
}

/// Render a code back to its spelling-prefix form, one trailing space
/// per syllable. Fails on any id the syllabary cannot resolve.
fn translate_code(syllabary: &dyn Syllabary, code: &Code) -> Option<String> {
    let mut result = String::new();
    for &syllable_id in code {
        let Some(spelling) = syllabary.syllable(syllable_id) else {
            warn!(syllable_id, "cannot translate syllable id");
            return None;
        };
        result.push_str(spelling);
        result.push(' ');
    }
    Some(result)
}

/// Build a ranked entry from a raw store record. Returns `None` for
/// keys that are not phrase records, undecodable values, and
/// tombstones. Reading never writes back: a stale `dee` is decayed
/// here for scoring only.
pub fn create_dict_entry(
    key: &str,
    value: &str,
    present_tick: u64,
    credibility: f64,
) -> Option<DictEntry> {
    let (_, text) = codec::split_key(key)?;
    let mut v = UserDbValue::unpack(value)?;
    if v.commits < 0 {
        return None; // deleted entry
    }
    if v.tick < present_tick {
        v.dee = scoring::decay(0.0, present_tick, v.dee, v.tick);
    }
    let rate = v.commits as f64 / present_tick.max(1) as f64;
    let p = scoring::probability(0.0, rate, present_tick, v.dee);
    let weight = (if p > 0.0 { p } else { f64::EPSILON }).ln() + credibility;
    let entry = DictEntry {
        text: text.to_string(),
        commit_count: v.commits,
        weight,
        ..Default::default()
    };
    debug!(
        text = %entry.text,
        weight = entry.weight,
        commit_count = entry.commit_count,
        present_tick,
        "entry created"
    );
    Some(entry)
}

//! Built-in store: sorted maps in memory, snapshot plus WAL on disk.
//!
//! All records live in `BTreeMap`s behind one `RwLock`. Every write
//! appends a WAL frame; once the frame count crosses the compaction
//! threshold a checkpoint rewrites the snapshot and truncates the log.
//! Opening a missing file yields an empty store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::wal::{DbWal, WalOp};
use super::{Db, DbCursor, Recoverable, Transactional};

const MAGIC: &[u8; 4] = b"SYUD";
const VERSION: u8 = 1;

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, String>,
    meta: BTreeMap<String, String>,
    loaded: bool,
    disabled: bool,
    wal: Option<DbWal>,
    journal: Option<Journal>,
}

/// Uncommitted transaction state: how to undo each write, and the WAL
/// frames to append once the transaction commits.
#[derive(Default)]
struct Journal {
    undo: Vec<UndoRecord>,
    pending: Vec<WalOp>,
}

enum UndoRecord {
    Entry { key: String, prior: Option<String> },
    Meta { key: String, prior: Option<String> },
}

pub struct MemoryDb {
    name: String,
    path: Option<PathBuf>,
    readonly: bool,
    inner: RwLock<Inner>,
}

impl MemoryDb {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
            readonly: false,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn read_only(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let mut db = Self::new(path, name);
        db.readonly = true;
        db
    }

    /// A store with no backing file. Everything is lost on drop.
    pub fn ephemeral(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            readonly: false,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the snapshot now and truncate the WAL.
    pub fn save(&self) -> bool {
        let Some(path) = self.path.as_deref() else {
            return true;
        };
        if self.readonly {
            return false;
        }
        let mut inner = self.inner.write().unwrap();
        if !inner.loaded {
            return false;
        }
        Self::checkpoint(&mut inner, path)
    }

    /// Returns whether the snapshot landed on disk.
    fn checkpoint(inner: &mut Inner, path: &Path) -> bool {
        let Inner {
            entries, meta, wal, ..
        } = inner;
        if let Err(e) = write_snapshot(path, entries, meta) {
            warn!(error = %e, "snapshot write failed");
            return false;
        }
        if let Some(wal) = wal {
            if let Err(e) = wal.truncate() {
                warn!(error = %e, "wal truncate failed");
            }
        }
        true
    }

    fn log_write(&self, inner: &mut Inner, op: &WalOp) {
        let Some(wal) = inner.wal.as_mut() else {
            return;
        };
        if let Err(e) = wal.append(op) {
            warn!(error = %e, "wal append failed");
            return;
        }
        if wal.needs_compact() {
            if let Some(path) = self.path.as_deref() {
                Self::checkpoint(inner, path);
            }
        }
    }
}

impl Db for MemoryDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.loaded {
            return false;
        }
        let Some(path) = self.path.as_deref() else {
            inner.loaded = true;
            return true;
        };
        let (mut entries, mut meta) = match fs::read(path) {
            Ok(bytes) => match from_bytes(&bytes) {
                Ok(maps) => maps,
                Err(e) => {
                    warn!(db = %self.name, error = %e, "unreadable snapshot");
                    return false;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Default::default(),
            Err(e) => {
                warn!(db = %self.name, error = %e, "failed to read snapshot");
                return false;
            }
        };
        let mut wal = DbWal::new(path);
        let replayed = match wal.replay(&mut entries, &mut meta) {
            Ok(n) => n,
            Err(e) => {
                warn!(db = %self.name, error = %e, "failed to read wal");
                0
            }
        };
        inner.entries = entries;
        inner.meta = meta;
        inner.wal = Some(wal);
        inner.loaded = true;
        if replayed > 0 && !self.readonly {
            Self::checkpoint(&mut inner, path);
        }
        debug!(db = %self.name, records = inner.entries.len(), replayed, "store opened");
        true
    }

    fn loaded(&self) -> bool {
        self.inner.read().unwrap().loaded
    }

    fn readonly(&self) -> bool {
        self.readonly
    }

    fn disabled(&self) -> bool {
        self.inner.read().unwrap().disabled
    }

    fn disable(&self) {
        self.inner.write().unwrap().disabled = true;
    }

    fn enable(&self) {
        self.inner.write().unwrap().disabled = false;
    }

    fn fetch(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap();
        if !inner.loaded || inner.disabled {
            return None;
        }
        inner.entries.get(key).cloned()
    }

    fn update(&self, key: &str, value: &str) -> bool {
        if self.readonly {
            return false;
        }
        let mut inner = self.inner.write().unwrap();
        if !inner.loaded || inner.disabled {
            return false;
        }
        let prior = inner.entries.insert(key.to_string(), value.to_string());
        let op = WalOp::Update {
            key: key.to_string(),
            value: value.to_string(),
        };
        match inner.journal.as_mut() {
            Some(journal) => {
                journal.undo.push(UndoRecord::Entry {
                    key: key.to_string(),
                    prior,
                });
                journal.pending.push(op);
            }
            None => self.log_write(&mut inner, &op),
        }
        true
    }

    fn meta_fetch(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().unwrap();
        if !inner.loaded || inner.disabled {
            return None;
        }
        inner.meta.get(key).cloned()
    }

    fn meta_update(&self, key: &str, value: &str) -> bool {
        if self.readonly {
            return false;
        }
        let mut inner = self.inner.write().unwrap();
        if !inner.loaded || inner.disabled {
            return false;
        }
        let prior = inner.meta.insert(key.to_string(), value.to_string());
        let op = WalOp::MetaUpdate {
            key: key.to_string(),
            value: value.to_string(),
        };
        match inner.journal.as_mut() {
            Some(journal) => {
                journal.undo.push(UndoRecord::Meta {
                    key: key.to_string(),
                    prior,
                });
                journal.pending.push(op);
            }
            None => self.log_write(&mut inner, &op),
        }
        true
    }

    fn query(&self, prefix: &str) -> Option<Box<dyn DbCursor>> {
        let inner = self.inner.read().unwrap();
        if !inner.loaded || inner.disabled {
            return None;
        }
        let records: Vec<(String, String)> = inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Box::new(MemoryCursor { records, pos: 0 }))
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        Some(self)
    }

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        Some(self)
    }
}

impl Transactional for MemoryDb {
    fn begin_transaction(&self) -> bool {
        if self.readonly {
            return false;
        }
        let mut inner = self.inner.write().unwrap();
        if !inner.loaded || inner.journal.is_some() {
            return false;
        }
        inner.journal = Some(Journal::default());
        true
    }

    fn commit_transaction(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        let Some(journal) = inner.journal.take() else {
            return false;
        };
        for op in &journal.pending {
            self.log_write(&mut inner, op);
        }
        true
    }

    fn abort_transaction(&self) -> bool {
        let mut inner = self.inner.write().unwrap();
        let Some(journal) = inner.journal.take() else {
            return false;
        };
        for record in journal.undo.into_iter().rev() {
            match record {
                UndoRecord::Entry { key, prior } => match prior {
                    Some(value) => {
                        inner.entries.insert(key, value);
                    }
                    None => {
                        inner.entries.remove(&key);
                    }
                },
                UndoRecord::Meta { key, prior } => match prior {
                    Some(value) => {
                        inner.meta.insert(key, value);
                    }
                    None => {
                        inner.meta.remove(&key);
                    }
                },
            }
        }
        true
    }

    fn in_transaction(&self) -> bool {
        self.inner.read().unwrap().journal.is_some()
    }
}

impl Recoverable for MemoryDb {
    /// Rebuild from whatever the WAL still holds, setting the unreadable
    /// snapshot aside for manual salvage.
    fn recover(&self) -> bool {
        if self.readonly {
            return false;
        }
        let Some(path) = self.path.as_deref() else {
            return false;
        };
        let mut inner = self.inner.write().unwrap();
        if inner.loaded {
            // Store is healthy; just flush a fresh snapshot.
            return Self::checkpoint(&mut inner, path);
        }
        let bad = path.with_extension("bad");
        match fs::rename(path, &bad) {
            Ok(()) => {
                warn!(db = %self.name, moved_to = %bad.display(), "set aside unreadable snapshot")
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(db = %self.name, error = %e, "failed to set aside snapshot"),
        }
        inner.entries.clear();
        inner.meta.clear();
        inner.journal = None;
        let mut wal = DbWal::new(path);
        let inner = &mut *inner;
        match wal.replay(&mut inner.entries, &mut inner.meta) {
            Ok(n) => debug!(db = %self.name, frames = n, "rebuilt store from wal"),
            Err(e) => warn!(db = %self.name, error = %e, "failed to read wal"),
        }
        inner.wal = Some(wal);
        inner.loaded = true;
        Self::checkpoint(inner, path)
    }
}

impl Drop for MemoryDb {
    fn drop(&mut self) {
        let Ok(inner) = self.inner.get_mut() else {
            return;
        };
        if !inner.loaded || self.readonly {
            return;
        }
        if let Some(path) = self.path.as_deref() {
            Self::checkpoint(inner, path);
        }
    }
}

struct MemoryCursor {
    records: Vec<(String, String)>,
    pos: usize,
}

impl DbCursor for MemoryCursor {
    fn jump(&mut self, key: &str) -> bool {
        self.pos = self.records.partition_point(|(k, _)| k.as_str() < key);
        self.pos < self.records.len()
    }

    fn reset(&mut self) -> bool {
        self.pos = 0;
        !self.records.is_empty()
    }

    fn next_record(&mut self) -> Option<(String, String)> {
        let record = self.records.get(self.pos).cloned()?;
        self.pos += 1;
        Some(record)
    }

    fn exhausted(&self) -> bool {
        self.pos >= self.records.len()
    }
}

/// Flat serialization record shared by the data and metadata sections.
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    key: String,
    value: String,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    meta: Vec<SnapshotRecord>,
    entries: Vec<SnapshotRecord>,
}

fn to_bytes(
    entries: &BTreeMap<String, String>,
    meta: &BTreeMap<String, String>,
) -> io::Result<Vec<u8>> {
    fn records(map: &BTreeMap<String, String>) -> Vec<SnapshotRecord> {
        map.iter()
            .map(|(k, v)| SnapshotRecord {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }
    let snapshot = Snapshot {
        meta: records(meta),
        entries: records(entries),
    };
    let body = bincode::serialize(&snapshot).map_err(io::Error::other)?;
    let mut buf = Vec::with_capacity(5 + body.len());
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&body);
    Ok(buf)
}

type Maps = (BTreeMap<String, String>, BTreeMap<String, String>);

fn from_bytes(bytes: &[u8]) -> io::Result<Maps> {
    if bytes.len() < 5 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "too short"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }
    if bytes[4] != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported version",
        ));
    }
    let snapshot: Snapshot = bincode::deserialize(&bytes[5..])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let into_map = |records: Vec<SnapshotRecord>| {
        records
            .into_iter()
            .map(|r| (r.key, r.value))
            .collect::<BTreeMap<_, _>>()
    };
    Ok((into_map(snapshot.entries), into_map(snapshot.meta)))
}

/// Atomic write: write to .tmp then rename.
fn write_snapshot(
    path: &Path,
    entries: &BTreeMap<String, String>,
    meta: &BTreeMap<String, String>,
) -> io::Result<()> {
    let bytes = to_bytes(entries, meta)?;
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("ud.syud")
    }

    #[test]
    fn open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDb::new(snapshot_path(&dir), "ud");
        assert!(db.open());
        assert!(db.loaded());
        assert_eq!(db.fetch("ni \tNi"), None);
        assert!(db.update("ni \tNi", "c=1 d=0.5 t=7"));
        assert_eq!(db.fetch("ni \tNi").as_deref(), Some("c=1 d=0.5 t=7"));
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        {
            let db = MemoryDb::new(&path, "ud");
            assert!(db.open());
            assert!(db.update("hao \tHao", "c=2 d=1.5 t=3"));
            assert!(db.meta_update("/tick", "3"));
            assert!(db.save());
        }
        let db = MemoryDb::new(&path, "ud");
        assert!(db.open());
        assert_eq!(db.fetch("hao \tHao").as_deref(), Some("c=2 d=1.5 t=3"));
        assert_eq!(db.meta_fetch("/tick").as_deref(), Some("3"));
    }

    #[test]
    fn wal_replay_after_crash() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        let db = MemoryDb::new(&path, "ud");
        assert!(db.open());
        assert!(db.update("ni \tNi", "c=1 d=1 t=1"));
        assert!(db.meta_update("/tick", "1"));
        // Simulate a crash before the drop-time checkpoint.
        std::mem::forget(db);

        let db = MemoryDb::new(&path, "ud");
        assert!(db.open());
        assert_eq!(db.fetch("ni \tNi").as_deref(), Some("c=1 d=1 t=1"));
        assert_eq!(db.meta_fetch("/tick").as_deref(), Some("1"));
    }

    #[test]
    fn transaction_commit_and_abort() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDb::new(snapshot_path(&dir), "ud");
        assert!(db.open());
        assert!(db.update("ni \tNi", "c=1 d=1 t=1"));

        assert!(db.begin_transaction());
        assert!(db.in_transaction());
        assert!(db.update("ni \tNi", "c=2 d=2 t=2"));
        assert!(db.update("hao \tHao", "c=1 d=1 t=2"));
        assert_eq!(db.fetch("ni \tNi").as_deref(), Some("c=2 d=2 t=2"));
        assert!(db.abort_transaction());
        assert!(!db.in_transaction());
        assert_eq!(db.fetch("ni \tNi").as_deref(), Some("c=1 d=1 t=1"));
        assert_eq!(db.fetch("hao \tHao"), None);

        assert!(db.begin_transaction());
        assert!(db.update("hao \tHao", "c=1 d=1 t=2"));
        assert!(db.commit_transaction());
        assert_eq!(db.fetch("hao \tHao").as_deref(), Some("c=1 d=1 t=2"));
    }

    #[test]
    fn cursor_prefix_and_jump() {
        let db = MemoryDb::ephemeral("ud");
        assert!(db.open());
        for (key, value) in [
            ("hao \tHao", "c=1 d=1 t=1"),
            ("ni \tNi", "c=1 d=1 t=1"),
            ("ni hao \tNiHao", "c=1 d=1 t=1"),
            ("nu \tNu", "c=1 d=1 t=1"),
        ] {
            assert!(db.update(key, value));
        }

        let mut cursor = db.query("ni").unwrap();
        let keys: Vec<String> = std::iter::from_fn(|| cursor.next_record())
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["ni \tNi", "ni hao \tNiHao"]);
        assert!(cursor.exhausted());

        let mut cursor = db.query("").unwrap();
        assert!(cursor.jump("ni"));
        assert_eq!(cursor.next_record().unwrap().0, "ni \tNi");
        // Jump may also move backward.
        assert!(cursor.jump("hao"));
        assert_eq!(cursor.next_record().unwrap().0, "hao \tHao");
        assert!(!cursor.jump("zz"));
        assert!(cursor.exhausted());
    }

    #[test]
    fn recover_sets_aside_bad_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        fs::write(&path, b"not a snapshot").unwrap();

        let db = MemoryDb::new(&path, "ud");
        assert!(!db.open());
        assert!(!db.loaded());
        assert!(db.recover());
        assert!(db.loaded());
        assert!(path.with_extension("bad").exists());
        assert!(db.update("ni \tNi", "c=1 d=1 t=1"));
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        {
            let db = MemoryDb::new(&path, "ud");
            assert!(db.open());
            assert!(db.update("ni \tNi", "c=1 d=1 t=1"));
        }
        let db = MemoryDb::read_only(&path, "ud");
        assert!(db.open());
        assert!(db.readonly());
        assert_eq!(db.fetch("ni \tNi").as_deref(), Some("c=1 d=1 t=1"));
        assert!(!db.update("ni \tNi", "c=9 d=9 t=9"));
        assert!(!db.begin_transaction());
    }
}

//! Sorted key-value store boundary for user dictionaries.
//!
//! The engine drives its store only through `Db`: point fetch/update, a
//! forward cursor over the lexicographically sorted key range, a metadata
//! namespace, and capability accessors for transactions and recovery.
//! `MemoryDb` is the built-in implementation.

pub mod memory;
mod wal;

pub use memory::MemoryDb;

/// A forward cursor over sorted records.
///
/// `jump` is the one operation allowed to move the cursor backward: it
/// repositions to the first key at or after the given one, returning
/// `false` when nothing remains there. `next_record` yields the current
/// record and advances.
pub trait DbCursor {
    fn jump(&mut self, key: &str) -> bool;
    fn reset(&mut self) -> bool;
    fn next_record(&mut self) -> Option<(String, String)>;
    fn exhausted(&self) -> bool;
}

/// Transaction capability of a store.
pub trait Transactional {
    fn begin_transaction(&self) -> bool;
    fn commit_transaction(&self) -> bool;
    fn abort_transaction(&self) -> bool;
    fn in_transaction(&self) -> bool;
}

/// Recovery capability of a store whose backing file failed to open.
pub trait Recoverable: Send + Sync {
    fn recover(&self) -> bool;
}

pub trait Db: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self) -> bool;
    fn loaded(&self) -> bool;
    fn readonly(&self) -> bool;
    /// A disabled store stays attached but answers no queries.
    fn disabled(&self) -> bool {
        false
    }
    /// Fence the store off while maintenance runs on it.
    fn disable(&self) {}
    fn enable(&self) {}
    fn fetch(&self, key: &str) -> Option<String>;
    fn update(&self, key: &str, value: &str) -> bool;
    fn meta_fetch(&self, key: &str) -> Option<String>;
    fn meta_update(&self, key: &str, value: &str) -> bool;
    /// Cursor over all records whose key starts with `prefix`, in key
    /// order; `None` when the store is not open.
    fn query(&self, prefix: &str) -> Option<Box<dyn DbCursor>>;
    fn as_transactional(&self) -> Option<&dyn Transactional> {
        None
    }
    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        None
    }
}

//! Background store maintenance.
//!
//! Repairs run on one named worker thread so a corrupt store never
//! blocks the session that tried to load it. Each store is queued at
//! most once at a time, keyed by name; the store is fenced off for the
//! duration of its repair.

use std::collections::HashSet;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

use crate::db::Db;

pub struct RecoveryService {
    tx: Option<mpsc::Sender<Arc<dyn Db>>>,
    worker: Option<thread::JoinHandle<()>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl RecoveryService {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Arc<dyn Db>>();
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let worker = {
            let in_flight = Arc::clone(&in_flight);
            thread::Builder::new()
                .name("sylime-recovery".into())
                .spawn(move || recovery_worker(rx, in_flight))
                .expect("failed to spawn recovery worker")
        };
        Self {
            tx: Some(tx),
            worker: Some(worker),
            in_flight,
        }
    }

    /// Queue a repair. Refused when the store cannot repair itself or
    /// a repair for it is already queued.
    pub fn schedule(&self, db: Arc<dyn Db>) -> bool {
        if db.as_recoverable().is_none() {
            return false;
        }
        let name = db.name().to_string();
        if !self.in_flight.lock().unwrap().insert(name.clone()) {
            debug!(db = %name, "repair already queued");
            return false;
        }
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        match tx.send(db) {
            Ok(()) => {
                debug!(db = %name, "repair queued");
                true
            }
            Err(_) => {
                self.in_flight.lock().unwrap().remove(&name);
                false
            }
        }
    }

    /// True while a repair for `name` is queued or running.
    pub fn pending(&self, name: &str) -> bool {
        self.in_flight.lock().unwrap().contains(name)
    }
}

impl Default for RecoveryService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecoveryService {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn recovery_worker(rx: mpsc::Receiver<Arc<dyn Db>>, in_flight: Arc<Mutex<HashSet<String>>>) {
    while let Ok(db) = rx.recv() {
        let name = db.name().to_string();
        db.disable();
        let repaired = db.as_recoverable().is_some_and(|r| r.recover());
        db.enable();
        if repaired {
            debug!(db = %name, "store repaired");
        } else {
            warn!(db = %name, "store repair failed");
        }
        in_flight.lock().unwrap().remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbCursor, MemoryDb, Recoverable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn wait_until_idle(service: &RecoveryService, name: &str) {
        for _ in 0..500 {
            if !service.pending(name) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("repair of {name} never finished");
    }

    struct SlowStore {
        calls: Arc<AtomicUsize>,
    }

    impl Db for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }
        fn open(&self) -> bool {
            false
        }
        fn loaded(&self) -> bool {
            false
        }
        fn readonly(&self) -> bool {
            false
        }
        fn fetch(&self, _key: &str) -> Option<String> {
            None
        }
        fn update(&self, _key: &str, _value: &str) -> bool {
            false
        }
        fn meta_fetch(&self, _key: &str) -> Option<String> {
            None
        }
        fn meta_update(&self, _key: &str, _value: &str) -> bool {
            false
        }
        fn query(&self, _prefix: &str) -> Option<Box<dyn DbCursor>> {
            None
        }
        fn as_recoverable(&self) -> Option<&dyn Recoverable> {
            Some(self)
        }
    }

    impl Recoverable for SlowStore {
        fn recover(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            true
        }
    }

    struct InertStore;

    impl Db for InertStore {
        fn name(&self) -> &str {
            "inert"
        }
        fn open(&self) -> bool {
            false
        }
        fn loaded(&self) -> bool {
            false
        }
        fn readonly(&self) -> bool {
            false
        }
        fn fetch(&self, _key: &str) -> Option<String> {
            None
        }
        fn update(&self, _key: &str, _value: &str) -> bool {
            false
        }
        fn meta_fetch(&self, _key: &str) -> Option<String> {
            None
        }
        fn meta_update(&self, _key: &str, _value: &str) -> bool {
            false
        }
        fn query(&self, _prefix: &str) -> Option<Box<dyn DbCursor>> {
            None
        }
    }

    #[test]
    fn duplicate_schedules_are_refused() {
        let service = RecoveryService::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let db: Arc<dyn Db> = Arc::new(SlowStore {
            calls: Arc::clone(&calls),
        });
        assert!(service.schedule(Arc::clone(&db)));
        assert!(!service.schedule(db));
        wait_until_idle(&service, "slow");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unrepairable_stores_are_refused() {
        let service = RecoveryService::new();
        assert!(!service.schedule(Arc::new(InertStore)));
        assert!(!service.pending("inert"));
    }

    #[test]
    fn repair_brings_a_corrupt_store_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.dict.snapshot");
        std::fs::write(&path, b"not a snapshot").unwrap();
        let db = Arc::new(MemoryDb::new(&path, "ud"));
        assert!(!db.open());

        let service = RecoveryService::new();
        let handle: Arc<dyn Db> = db.clone();
        assert!(service.schedule(handle));
        wait_until_idle(&service, "ud");

        assert!(db.loaded());
        assert!(db.update("ni \tNi", "c=1 d=1 t=1"));
        assert!(path.with_extension("bad").exists());
    }
}

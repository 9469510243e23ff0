use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

use sylime_core::db::{Db, MemoryDb, Recoverable};
use sylime_core::settings::DictSettings;
use sylime_core::user_dict::codec::{self, UserDbValue};
use sylime_core::user_dict::UserDictionary;

use crate::snapshot;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub fn default_store_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{home}/.local/share/sylime/user_dict.syud")
}

fn store_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "user_dict".to_string())
}

/// Open the store at `path` and stand a dictionary up on it. A missing
/// file is an error for read-only access and a fresh store otherwise.
pub(crate) fn open_store(
    path: &Path,
    readonly: bool,
    settings: &DictSettings,
) -> (Arc<MemoryDb>, UserDictionary) {
    if readonly && !path.exists() {
        eprintln!("No user dictionary at {}", path.display());
        process::exit(1);
    }
    if !readonly {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
    }
    let name = store_name(path);
    let db = Arc::new(if readonly {
        MemoryDb::read_only(path, name.as_str())
    } else {
        MemoryDb::new(path, name.as_str())
    });
    let mut dict = UserDictionary::new(name, Arc::clone(&db) as Arc<dyn Db>, settings);
    if !dict.load() {
        eprintln!(
            "Error opening user dictionary at {} (try `udtool repair`)",
            path.display()
        );
        process::exit(1);
    }
    (db, dict)
}

pub(crate) fn save_store(db: &MemoryDb) {
    if !db.save() {
        eprintln!("Error saving user dictionary");
        process::exit(1);
    }
}

/// Live and tombstoned phrase record counts.
fn count_records(db: &MemoryDb) -> (usize, usize) {
    let mut live = 0usize;
    let mut deleted = 0usize;
    if let Some(mut cursor) = db.query("") {
        while let Some((key, value)) = cursor.next_record() {
            if codec::split_key(&key).is_none() {
                continue;
            }
            match UserDbValue::unpack(&value) {
                Some(v) if v.commits < 0 => deleted += 1,
                Some(_) => live += 1,
                None => {}
            }
        }
    }
    (live, deleted)
}

pub fn info(path: &Path) {
    let (db, dict) = open_store(path, true, &DictSettings::default());
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let (live, deleted) = count_records(&db);

    println!("Store:      {}", path.display());
    println!("File size:  {:.1} KB", file_size as f64 / 1024.0);
    println!("Tick:       {}", dict.tick());
    println!("Entries:    {live}");
    println!("Deleted:    {deleted}");
}

pub fn list(path: &Path) {
    let (db, _dict) = open_store(path, true, &DictSettings::default());
    let mut listed = 0usize;
    if let Some(mut cursor) = db.query("") {
        while let Some((key, value)) = cursor.next_record() {
            let Some((code, text)) = codec::split_key(&key) else {
                continue;
            };
            let Some(v) = UserDbValue::unpack(&value) else {
                continue;
            };
            if v.commits < 0 {
                continue;
            }
            println!("{}\t{}\t{}", code.trim_end(), text, v.commits);
            listed += 1;
        }
    }
    if listed == 0 {
        println!("(empty)");
    } else {
        println!("---");
        println!("{listed} entries");
    }
}

pub fn export(path: &Path, output: &Path) {
    let (db, _dict) = open_store(path, true, &DictSettings::default());
    let written = die!(
        snapshot::write_snapshot(db.as_ref(), output),
        "Error writing snapshot: {}"
    );
    eprintln!(
        "Snapshot written: {} records -> {}",
        written,
        output.display()
    );
}

pub fn import(path: &Path, input: &Path) {
    let entries = die!(snapshot::read_snapshot(input), "Error reading snapshot: {}");
    let (db, mut dict) = open_store(path, false, &DictSettings::default());
    let mut imported = 0usize;
    let mut max_tick = dict.tick();
    for entry in &entries {
        let v = UserDbValue {
            commits: entry.commits,
            dee: entry.dee,
            tick: entry.tick,
        };
        if db.update(&codec::build_key(&entry.code, &entry.text), &v.pack()) {
            imported += 1;
        }
        max_tick = max_tick.max(entry.tick);
    }
    // Raise the clock so imported stamps stay in the past.
    let delta = max_tick - dict.tick();
    if delta > 0 {
        dict.update_tick_count(delta);
    }
    save_store(&db);
    println!("Imported {imported} of {} records", entries.len());
}

/// Rebuild an unreadable store from its log, setting the bad snapshot
/// aside. A store that opens cleanly is left alone.
pub fn repair(path: &Path) {
    if !path.exists() {
        eprintln!("No user dictionary at {}", path.display());
        process::exit(1);
    }
    let db = MemoryDb::new(path, store_name(path));
    if db.open() {
        println!("Store opened cleanly; nothing to repair");
        return;
    }
    if !db.recover() {
        eprintln!("Recovery failed for {}", path.display());
        process::exit(1);
    }
    let (live, deleted) = count_records(&db);
    println!("Recovered: {live} entries, {deleted} deleted");
}

//! JSONL snapshots of a learning store, for backup and migration.
//!
//! One JSON object per line, one line per phrase record. Tombstones are
//! included so a restore reproduces the store exactly; the metadata tick
//! is not part of the snapshot and must be restored by the importer.

use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sylime_core::db::Db;
use sylime_core::user_dict::codec::{self, UserDbValue};

/// One phrase record with its value fields broken out.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Code string as stored, trailing space retained.
    pub code: String,
    pub text: String,
    pub commits: i32,
    pub dee: f64,
    pub tick: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("store is not loaded")]
    StoreClosed,
}

/// Dump every phrase record of `db` to `path`, one JSON line each.
/// Records that are not phrases (the legacy tick key) and values that
/// fail to decode are skipped. Returns the number of lines written.
pub fn write_snapshot(db: &dyn Db, path: &Path) -> Result<usize, SnapshotError> {
    let Some(mut cursor) = db.query("") else {
        return Err(SnapshotError::StoreClosed);
    };
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let mut written = 0usize;
    while let Some((key, value)) = cursor.next_record() {
        let Some((code, text)) = codec::split_key(&key) else {
            continue;
        };
        let Some(v) = UserDbValue::unpack(&value) else {
            continue;
        };
        let entry = SnapshotEntry {
            code: code.to_string(),
            text: text.to_string(),
            commits: v.commits,
            dee: v.dee,
            tick: v.tick,
        };
        let line = serde_json::to_string(&entry).map_err(|e| SnapshotError::Json(e.to_string()))?;
        writeln!(writer, "{line}")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Read a snapshot written by [`write_snapshot`]. Blank lines are
/// skipped; any malformed line fails the whole read.
pub fn read_snapshot(path: &Path) -> Result<Vec<SnapshotEntry>, SnapshotError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: SnapshotEntry = serde_json::from_str(&line)
            .map_err(|e| SnapshotError::Json(format!("line {}: {}", number + 1, e)))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylime_core::db::MemoryDb;

    fn value(commits: i32, dee: f64, tick: u64) -> String {
        UserDbValue { commits, dee, tick }.pack()
    }

    #[test]
    fn snapshot_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDb::ephemeral("snap");
        assert!(db.open());
        db.update("", "42");
        db.update("ni \tNi", &value(3, 2.5, 7));
        db.update("ni hao \tNihao", &value(-2, 0.5, 3));

        let file = dir.path().join("dump.jsonl");
        let written = write_snapshot(&db, &file).unwrap();
        assert_eq!(written, 2);

        let entries = read_snapshot(&file).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "ni ");
        assert_eq!(entries[0].text, "Ni");
        assert_eq!(entries[0].commits, 3);
        assert_eq!(entries[1].commits, -2);
        assert_eq!(entries[1].tick, 3);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gaps.jsonl");
        fs::write(
            &file,
            "\n{\"code\":\"ni \",\"text\":\"Ni\",\"commits\":1,\"dee\":1.0,\"tick\":1}\n\n",
        )
        .unwrap();
        let entries = read_snapshot(&file).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Ni");
    }

    #[test]
    fn malformed_lines_fail_the_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.jsonl");
        fs::write(
            &file,
            "{\"code\":\"ni \",\"text\":\"Ni\",\"commits\":1,\"dee\":1.0,\"tick\":1}\nnot json\n",
        )
        .unwrap();
        let err = read_snapshot(&file).unwrap_err();
        assert!(matches!(err, SnapshotError::Json(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn unopened_store_refuses_to_dump() {
        let dir = tempfile::tempdir().unwrap();
        let db = MemoryDb::ephemeral("closed");
        let err = write_snapshot(&db, &dir.path().join("x.jsonl")).unwrap_err();
        assert!(matches!(err, SnapshotError::StoreClosed));
    }
}

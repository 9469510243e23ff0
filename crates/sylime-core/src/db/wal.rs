//! Write-ahead log for user-db learning writes.
//!
//! Each committed write appends a small frame instead of rewriting the
//! whole snapshot. A periodic checkpoint writes the full snapshot and
//! truncates the log.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const COMPACT_THRESHOLD: usize = 1000;

/// A single logged write, replayed in order on open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) enum WalOp {
    Update { key: String, value: String },
    MetaUpdate { key: String, value: String },
}

/// WAL state that lives alongside a snapshot file.
pub(super) struct DbWal {
    wal_path: PathBuf,
    /// Kept open in append mode to avoid repeated open/close per write.
    file: Option<File>,
    /// Number of frames in the current WAL (since last compaction).
    frame_count: usize,
}

impl DbWal {
    pub fn new(snapshot_path: &Path) -> Self {
        let mut ext = snapshot_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !ext.is_empty() {
            ext.push('.');
        }
        ext.push_str("wal");
        Self {
            wal_path: snapshot_path.with_extension(ext),
            file: None,
            frame_count: 0,
        }
    }

    /// Replay the WAL into the given maps, stopping cleanly at the first
    /// truncated or corrupt frame. Returns the number of frames replayed.
    pub fn replay(
        &mut self,
        entries: &mut BTreeMap<String, String>,
        meta: &mut BTreeMap<String, String>,
    ) -> io::Result<usize> {
        let data = match fs::read(&self.wal_path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.frame_count = 0;
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        let mut count = 0;
        let mut pos = 0;
        while pos + 8 <= data.len() {
            let length = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
            let expected_crc = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap());

            if length == 0 || pos + 8 + length > data.len() {
                break; // truncated frame
            }

            let payload = &data[pos + 8..pos + 8 + length];
            if crc32fast::hash(payload) != expected_crc {
                break; // corrupt frame
            }

            match bincode::deserialize::<WalOp>(payload) {
                Ok(WalOp::Update { key, value }) => {
                    entries.insert(key, value);
                }
                Ok(WalOp::MetaUpdate { key, value }) => {
                    meta.insert(key, value);
                }
                Err(_) => break, // corrupt payload
            }
            count += 1;
            pos += 8 + length;
        }

        self.frame_count = count;
        Ok(count)
    }

    /// Append one frame to the WAL file.
    pub fn append(&mut self, op: &WalOp) -> io::Result<()> {
        let payload = bincode::serialize(op).map_err(io::Error::other)?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let file = self.open_file()?;
        file.write_all(&length.to_le_bytes())?;
        file.write_all(&crc.to_le_bytes())?;
        file.write_all(&payload)?;

        self.frame_count += 1;
        Ok(())
    }

    fn open_file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.wal_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.wal_path)?;
            self.file = Some(f);
        }
        Ok(self.file.as_mut().unwrap())
    }

    /// Whether the WAL has reached the compaction threshold.
    pub fn needs_compact(&self) -> bool {
        self.frame_count >= COMPACT_THRESHOLD
    }

    /// Truncate the WAL file and reset the frame count. Call after a
    /// snapshot has been written.
    pub fn truncate(&mut self) -> io::Result<()> {
        self.file = None;
        File::create(&self.wal_path)?;
        self.frame_count = 0;
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }
}

//! Snapshot + write-ahead-log persistence on plain files.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rkyv::rancor::Error as RkyvError;
use rkyv::{from_bytes, to_bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::dedup::content_hash;
use crate::error::{RagError, Result};
use crate::types::{Chunk, IndexEntry, Metadata};

use super::Persistence;

/// Serialized form of the nearest-neighbor structure: dimension, metric
/// name, and the vectors in arena order (positional dense ids).
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct VectorSnapshot {
    dimension: u32,
    metric: String,
    vectors: Vec<Vec<f32>>,
}

/// One chunk record in the JSON sidecar, aligned positionally with the
/// snapshot vectors.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkRecord {
    id: String,
    content: String,
    document_id: String,
    index: usize,
    #[serde(default)]
    metadata: Metadata,
    created_at: DateTime<Utc>,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.text.clone(),
            document_id: chunk.source_id.clone(),
            index: chunk.index,
            metadata: chunk.metadata.clone(),
            created_at: chunk.created_at,
        }
    }
}

impl ChunkRecord {
    fn into_chunk(self) -> Chunk {
        let hash = content_hash(&self.content);
        Chunk {
            id: self.id,
            text: self.content,
            source_id: self.document_id,
            index: self.index,
            metadata: self.metadata,
            content_hash: hash,
            created_at: self.created_at,
        }
    }
}

/// One line of the write-ahead log.
#[derive(Debug, Serialize, Deserialize)]
struct WalRecord {
    chunk: ChunkRecord,
    embedding: Vec<f32>,
}

/// File-based persistence: a binary index snapshot, a JSON chunk
/// sidecar, and a JSON-lines write-ahead log sharing one base path.
///
/// For a base path of `index.bin` the artifacts are:
///
/// - `index.bin` — rkyv-serialized [`VectorSnapshot`]
/// - `index.chunks.json` — array of chunk records, one per vector
/// - `index.wal` — insertions logged since the last snapshot
///
/// Loading reads the snapshot pair (when both halves exist and agree)
/// and replays the log on top. A snapshot vector without a matching
/// sidecar record is unreachable and dropped with a warning; a torn
/// trailing log line is skipped. Either way the load degrades instead
/// of failing.
#[derive(Debug)]
pub struct SnapshotWal {
    base: PathBuf,
    sidecar: PathBuf,
    wal: PathBuf,
    pending: Mutex<usize>,
}

impl SnapshotWal {
    /// Creates a backend rooted at the given base path.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let sidecar = base.with_extension("chunks.json");
        let wal = base.with_extension("wal");
        Self {
            base,
            sidecar,
            wal,
            pending: Mutex::new(0),
        }
    }

    /// Returns the sidecar path.
    #[must_use]
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar
    }

    /// Returns the write-ahead-log path.
    #[must_use]
    pub fn wal_path(&self) -> &Path {
        &self.wal
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.base.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Vec<IndexEntry>> {
        let bytes = fs::read(&self.base).map_err(|e| RagError::Persistence {
            path: self.base.clone(),
            source: e,
        })?;
        let snapshot = from_bytes::<VectorSnapshot, RkyvError>(&bytes)
            .map_err(|e| RagError::Serialization(e.to_string()))?;

        let sidecar_raw = fs::read_to_string(&self.sidecar).map_err(|e| RagError::Persistence {
            path: self.sidecar.clone(),
            source: e,
        })?;
        let records: Vec<ChunkRecord> = serde_json::from_str(&sidecar_raw)
            .map_err(|e| RagError::Serialization(e.to_string()))?;

        if snapshot.vectors.len() != records.len() {
            tracing::warn!(
                vectors = snapshot.vectors.len(),
                records = records.len(),
                "index snapshot and chunk sidecar disagree, unmatched entries are unreachable"
            );
        }

        Ok(records
            .into_iter()
            .zip(snapshot.vectors)
            .map(|(record, embedding)| IndexEntry::new(record.into_chunk(), embedding))
            .collect())
    }

    fn replay_wal(&self, entries: &mut Vec<IndexEntry>) -> usize {
        let Ok(raw) = fs::read_to_string(&self.wal) else {
            return 0;
        };

        // Later records win: an id seen twice replaces the earlier
        // entry at its original position.
        let mut positions: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.id.clone(), i))
            .collect();

        let mut replayed = 0;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalRecord>(line) {
                Ok(record) => {
                    let entry = IndexEntry::new(record.chunk.into_chunk(), record.embedding);
                    if let Some(&pos) = positions.get(&entry.chunk.id) {
                        entries[pos] = entry;
                    } else {
                        positions.insert(entry.chunk.id.clone(), entries.len());
                        entries.push(entry);
                    }
                    replayed += 1;
                }
                Err(err) => {
                    // Expected after a crash mid-append.
                    tracing::warn!("skipping unreadable WAL line: {err}");
                }
            }
        }
        replayed
    }
}

impl Persistence for SnapshotWal {
    fn append(&self, entry: &IndexEntry) -> Result<()> {
        self.ensure_parent()?;

        let record = WalRecord {
            chunk: ChunkRecord::from(&entry.chunk),
            embedding: entry.embedding.clone(),
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| RagError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.wal)
            .map_err(|e| RagError::Persistence {
                path: self.wal.clone(),
                source: e,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| RagError::Persistence {
                path: self.wal.clone(),
                source: e,
            })?;

        *self.pending.lock() += 1;
        Ok(())
    }

    fn snapshot(&self, entries: &[IndexEntry]) -> Result<()> {
        self.ensure_parent()?;

        let snapshot = VectorSnapshot {
            dimension: entries
                .first()
                .map_or(0, |e| u32::try_from(e.embedding.len()).unwrap_or(0)),
            metric: "cosine".to_string(),
            vectors: entries.iter().map(|e| e.embedding.clone()).collect(),
        };
        let bytes =
            to_bytes::<RkyvError>(&snapshot).map_err(|e| RagError::Serialization(e.to_string()))?;
        fs::write(&self.base, &bytes).map_err(|e| RagError::Persistence {
            path: self.base.clone(),
            source: e,
        })?;

        let records: Vec<ChunkRecord> = entries.iter().map(|e| ChunkRecord::from(&e.chunk)).collect();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| RagError::Serialization(e.to_string()))?;
        fs::write(&self.sidecar, &json).map_err(|e| RagError::Persistence {
            path: self.sidecar.clone(),
            source: e,
        })?;

        if self.wal.exists() {
            fs::remove_file(&self.wal).map_err(|e| RagError::Persistence {
                path: self.wal.clone(),
                source: e,
            })?;
        }
        *self.pending.lock() = 0;

        tracing::info!(entries = entries.len(), path = %self.base.display(), "index snapshot written");
        Ok(())
    }

    fn load(&self) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();

        match (self.base.exists(), self.sidecar.exists()) {
            (true, true) => match self.read_snapshot() {
                Ok(loaded) => {
                    entries = loaded;
                    tracing::info!(
                        entries = entries.len(),
                        path = %self.base.display(),
                        "loaded index snapshot"
                    );
                }
                Err(err) => {
                    tracing::error!("failed to load index snapshot, starting empty: {err}");
                }
            },
            (false, false) => {}
            _ => {
                tracing::warn!(
                    path = %self.base.display(),
                    "incomplete snapshot pair, relying on the WAL only"
                );
            }
        }

        let replayed = self.replay_wal(&mut entries);
        *self.pending.lock() = replayed;

        Ok(entries)
    }

    fn pending(&self) -> usize {
        *self.pending.lock()
    }

    fn path(&self) -> &Path {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_entry(id: &str, text: &str, embedding: Vec<f32>) -> IndexEntry {
        let chunk = Chunk::new(id, text, "doc1", 0, content_hash(text));
        IndexEntry::new(chunk, embedding)
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        let entries = vec![
            make_entry("c1", "hello", vec![1.0, 0.0]),
            make_entry("c2", "world", vec![0.0, 1.0]),
        ];
        backend.snapshot(&entries).unwrap();

        assert!(dir.path().join("index.bin").exists());
        assert!(dir.path().join("index.chunks.json").exists());

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].chunk.id, "c1");
        assert_eq!(loaded[0].embedding, vec![1.0, 0.0]);
        assert_eq!(loaded[1].chunk.text, "world");
    }

    #[test]
    fn sidecar_is_readable_json() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));
        backend
            .snapshot(&[make_entry("c1", "hello", vec![1.0, 0.0])])
            .unwrap();

        let raw = fs::read_to_string(backend.sidecar_path()).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["id"], "c1");
        assert_eq!(parsed[0]["content"], "hello");
        assert_eq!(parsed[0]["document_id"], "doc1");
        assert!(parsed[0]["created_at"].is_string());
    }

    #[test]
    fn wal_replays_without_snapshot() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        backend.append(&make_entry("c1", "hello", vec![1.0, 0.0])).unwrap();
        backend.append(&make_entry("c2", "world", vec![0.0, 1.0])).unwrap();
        assert_eq!(backend.pending(), 2);

        let reopened = SnapshotWal::new(dir.path().join("index.bin"));
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(reopened.pending(), 2);
    }

    #[test]
    fn snapshot_truncates_wal() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        let entry = make_entry("c1", "hello", vec![1.0, 0.0]);
        backend.append(&entry).unwrap();
        backend.snapshot(&[entry]).unwrap();

        assert_eq!(backend.pending(), 0);
        assert!(!backend.wal_path().exists());

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn torn_wal_line_is_skipped() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));
        backend.append(&make_entry("c1", "hello", vec![1.0, 0.0])).unwrap();

        // Simulate a crash mid-append.
        let mut file = OpenOptions::new()
            .append(true)
            .open(backend.wal_path())
            .unwrap();
        file.write_all(b"{\"chunk\":{\"id\":\"c2\",\"conte").unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.id, "c1");
    }

    #[test]
    fn wal_update_replaces_snapshot_entry() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        backend
            .snapshot(&[make_entry("c1", "old text", vec![1.0, 0.0])])
            .unwrap();
        backend.append(&make_entry("c1", "new text", vec![0.0, 1.0])).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.text, "new text");
        assert_eq!(loaded[0].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn corrupt_snapshot_degrades_to_wal() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        backend
            .snapshot(&[make_entry("c1", "snapshotted", vec![1.0, 0.0])])
            .unwrap();
        fs::write(backend.path(), b"not an index").unwrap();
        backend.append(&make_entry("c2", "logged", vec![0.0, 1.0])).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.id, "c2");
    }

    #[test]
    fn sidecar_mismatch_drops_unmatched() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));

        backend
            .snapshot(&[
                make_entry("c1", "first", vec![1.0, 0.0]),
                make_entry("c2", "second", vec![0.0, 1.0]),
            ])
            .unwrap();

        // Drop the last sidecar record; its vector becomes unreachable.
        let raw = fs::read_to_string(backend.sidecar_path()).unwrap();
        let mut records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        records.pop();
        fs::write(backend.sidecar_path(), serde_json::to_vec(&records).unwrap()).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.id, "c1");
    }

    #[test]
    fn load_from_nothing() {
        let dir = tempdir().unwrap();
        let backend = SnapshotWal::new(dir.path().join("index.bin"));
        assert!(backend.load().unwrap().is_empty());
        assert_eq!(backend.pending(), 0);
    }
}

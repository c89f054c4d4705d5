//! Durable storage for the vector index.
//!
//! This module provides the [`Persistence`] trait and the
//! [`SnapshotWal`] implementation. Durability follows a write-ahead
//! pattern: every insertion is appended to a log before the ingest call
//! returns, and a periodic snapshot rewrites the full index so the log
//! stays short. A crash loses at most the in-flight insertion, never
//! the index.

mod snapshot;

pub use snapshot::SnapshotWal;

use crate::error::Result;
use crate::types::IndexEntry;
use std::path::Path;

/// Trait for index persistence backends.
pub trait Persistence: Send + Sync {
    /// Durably records one insertion.
    ///
    /// Called once per indexed chunk, before the ingestion that
    /// produced it completes.
    fn append(&self, entry: &IndexEntry) -> Result<()>;

    /// Rewrites the full persisted state from the given entries and
    /// truncates the append log.
    fn snapshot(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Loads all persisted entries: the last snapshot plus every
    /// logged insertion since.
    ///
    /// Returns an empty vector when nothing was persisted. Corrupt
    /// artifacts are logged and skipped rather than failing the load.
    fn load(&self) -> Result<Vec<IndexEntry>>;

    /// Returns the number of logged insertions not yet covered by a
    /// snapshot.
    fn pending(&self) -> usize;

    /// Returns the base storage path.
    fn path(&self) -> &Path;
}

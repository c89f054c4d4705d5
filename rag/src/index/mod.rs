//! Vector index implementations.
//!
//! This module provides the [`VectorIndex`] trait and the [`HnswIndex`]
//! implementation for approximate nearest neighbor search over chunk
//! embeddings.

mod hnsw;

pub use hnsw::HnswIndex;

use crate::error::Result;
use crate::types::{Chunk, IndexEntry, SearchResult};

/// Trait for vector index implementations.
///
/// A vector index stores chunks with their embedding vectors and
/// supports similarity search. Chunks are addressed by their string id;
/// internally implementations map ids to dense positions, so search
/// results always hydrate back to exactly one chunk.
pub trait VectorIndex: Send + Sync {
    /// Inserts or updates a chunk with its embedding vector.
    ///
    /// A chunk with an existing ID replaces the previous entry.
    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()>;

    /// Removes a chunk by its ID.
    ///
    /// Returns `true` if a chunk was removed.
    fn remove(&self, chunk_id: &str) -> bool;

    /// Removes every chunk belonging to a document.
    ///
    /// Returns the number of chunks removed.
    fn remove_document(&self, document_id: &str) -> usize;

    /// Searches for the chunks most similar to the query vector.
    ///
    /// Returns up to `top_k` results with scores in `(0.0, 1.0]`,
    /// ordered by descending similarity. An empty index yields an empty
    /// result set.
    fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>>;

    /// Returns the embedding dimension.
    fn dimension(&self) -> usize;

    /// Returns the number of indexed chunks.
    fn len(&self) -> usize;

    /// Returns `true` if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the index.
    fn clear(&self);

    /// Returns a copy of all index entries, in arena order.
    fn entries(&self) -> Vec<IndexEntry>;

    /// Loads entries into the index, replacing existing content.
    fn load(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Checks if a content hash already exists in the index.
    fn contains_hash(&self, hash: u64) -> bool;
}

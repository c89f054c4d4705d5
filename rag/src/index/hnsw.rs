//! HNSW-based vector index using instant-distance.

use instant_distance::{Builder, HnswMap, Point, Search};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{RagError, Result};
use crate::types::{Chunk, IndexEntry, SearchResult};

use super::VectorIndex;

/// A point wrapper for instant-distance holding an embedding vector.
#[derive(Clone, Debug)]
struct EmbeddingPoint {
    embedding: Vec<f32>,
}

impl Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        // Cosine distance: 0.0 for identical direction, growing as
        // vectors diverge.
        1.0 - cosine_similarity(&self.embedding, &other.embedding)
    }
}

/// Computes cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (lhs, rhs) in a.iter().zip(b) {
        dot += lhs * rhs;
        norm_a += lhs * lhs;
        norm_b += rhs * rhs;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Converts a distance into the bounded similarity score.
///
/// Monotonic in the distance: `1.0` at distance zero, decaying smoothly
/// toward zero, so result ordering matches the underlying metric.
fn similarity_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Internal state guarded by a single writer lock.
struct IndexState {
    /// Dense arena of stored entries; the HNSW graph addresses entries
    /// by their position here, so every hit resolves to exactly one
    /// chunk without any derived-key hashing.
    entries: Vec<IndexEntry>,
    /// Chunk ID to arena position.
    id_to_index: HashMap<String, usize>,
    /// Content hashes for deduplication.
    content_hashes: HashMap<u64, String>,
    /// The HNSW graph, rebuilt lazily after modifications.
    hnsw: Option<HnswMap<EmbeddingPoint, usize>>,
    /// Whether the graph is stale.
    dirty: bool,
}

impl IndexState {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            id_to_index: HashMap::new(),
            content_hashes: HashMap::new(),
            hnsw: None,
            dirty: false,
        }
    }

    fn rebuild_hnsw(&mut self) {
        if self.entries.is_empty() {
            self.hnsw = None;
            self.dirty = false;
            return;
        }

        let points: Vec<EmbeddingPoint> = self
            .entries
            .iter()
            .map(|e| EmbeddingPoint {
                embedding: e.embedding.clone(),
            })
            .collect();
        let positions: Vec<usize> = (0..self.entries.len()).collect();

        self.hnsw = Some(Builder::default().build(points, positions));
        self.dirty = false;
    }

    /// Rebuilds the lookup maps after bulk arena changes.
    fn reindex(&mut self) {
        self.id_to_index.clear();
        self.content_hashes.clear();
        for (idx, entry) in self.entries.iter().enumerate() {
            self.id_to_index.insert(entry.chunk.id.clone(), idx);
            self.content_hashes
                .insert(entry.chunk.content_hash, entry.chunk.id.clone());
        }
        self.dirty = true;
    }
}

/// HNSW-backed vector index for approximate nearest neighbor search.
///
/// Entries live in a dense arena and the graph stores arena positions
/// directly. Modifications mark the graph stale; the first search after
/// a modification rebuilds it under the writer lock, so hits always
/// resolve against current arena positions.
///
/// # Example
///
/// ```rust
/// use lodestone_rag::index::{HnswIndex, VectorIndex};
///
/// let index = HnswIndex::new(384);
/// assert!(index.is_empty());
/// ```
pub struct HnswIndex {
    dimension: usize,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("HnswIndex")
            .field("dimension", &self.dimension)
            .field("len", &state.entries.len())
            .finish()
    }
}

impl HnswIndex {
    /// Creates a new index for embeddings of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(IndexState::new()),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        self.check_dimension(&embedding)?;

        let mut state = self.state.write();

        if let Some(&idx) = state.id_to_index.get(&chunk.id) {
            let old_hash = state.entries[idx].chunk.content_hash;
            state.content_hashes.remove(&old_hash);
            state
                .content_hashes
                .insert(chunk.content_hash, chunk.id.clone());
            state.entries[idx] = IndexEntry::new(chunk, embedding);
        } else {
            let idx = state.entries.len();
            state.id_to_index.insert(chunk.id.clone(), idx);
            state
                .content_hashes
                .insert(chunk.content_hash, chunk.id.clone());
            state.entries.push(IndexEntry::new(chunk, embedding));
        }

        state.dirty = true;
        Ok(())
    }

    fn remove(&self, chunk_id: &str) -> bool {
        let mut state = self.state.write();

        let Some(&idx) = state.id_to_index.get(chunk_id) else {
            return false;
        };

        let hash = state.entries[idx].chunk.content_hash;
        state.content_hashes.remove(&hash);

        let removed = state.entries.swap_remove(idx);
        state.id_to_index.remove(&removed.chunk.id);

        if idx < state.entries.len() {
            let swapped_id = state.entries[idx].chunk.id.clone();
            state.id_to_index.insert(swapped_id, idx);
        }

        state.dirty = true;
        true
    }

    fn remove_document(&self, document_id: &str) -> usize {
        let mut state = self.state.write();

        let before = state.entries.len();
        state
            .entries
            .retain(|entry| entry.chunk.source_id != document_id);
        let removed = before - state.entries.len();

        if removed > 0 {
            state.reindex();
        }
        removed
    }

    fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        self.check_dimension(query)?;

        let mut state = self.state.write();

        if state.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if state.dirty || state.hnsw.is_none() {
            state.rebuild_hnsw();
        }

        let Some(ref hnsw) = state.hnsw else {
            return Ok(Vec::new());
        };

        let query_point = EmbeddingPoint {
            embedding: query.to_vec(),
        };

        let mut search = Search::default();
        let mut results = Vec::new();

        for candidate in hnsw.search(&query_point, &mut search).take(top_k) {
            let idx = *candidate.value;
            let entry = &state.entries[idx];
            let score = similarity_score(candidate.distance);

            if score >= threshold {
                results.push(SearchResult {
                    chunk: entry.chunk.clone(),
                    score,
                });
            }
        }

        results.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.score)));

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.id_to_index.clear();
        state.content_hashes.clear();
        state.hnsw = None;
        state.dirty = false;
    }

    fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().entries.clone()
    }

    fn load(&self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in &entries {
            self.check_dimension(&entry.embedding)?;
        }

        let mut state = self.state.write();
        state.entries = entries;
        state.reindex();
        Ok(())
    }

    fn contains_hash(&self, hash: u64) -> bool {
        self.state.read().content_hashes.contains_key(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(id: &str, doc: &str, text: &str) -> Chunk {
        Chunk::new(id, text, doc, 0, crate::dedup::content_hash(text))
    }

    #[test]
    fn insert_and_search() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("c1", "doc1", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c2", "doc1", "world"), vec![0.0, 1.0, 0.0, 0.0])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c1");
    }

    #[test]
    fn perfect_match_scores_one() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("c1", "doc1", "hello"), vec![0.5, 0.5, 0.0, 0.0])
            .unwrap();

        let results = index.search(&[0.5, 0.5, 0.0, 0.0], 1, 0.0).unwrap();
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scores_bounded_and_sorted() {
        let index = HnswIndex::new(3);
        index
            .insert(make_chunk("c1", "d", "a"), vec![1.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c2", "d", "b"), vec![0.7, 0.7, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c3", "d", "c"), vec![-1.0, 0.0, 0.0])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3, 0.0).unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for result in &results {
            assert!(result.score > 0.0 && result.score <= 1.0);
        }
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = HnswIndex::new(4);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 5, 0.0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn dimension_mismatch() {
        let index = HnswIndex::new(4);
        let result = index.insert(make_chunk("c1", "d", "x"), vec![1.0, 0.0]);
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));

        let result = index.search(&[1.0], 1, 0.0);
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
    }

    #[test]
    fn update_existing_id() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("c1", "d", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c1", "d", "world"), vec![0.0, 1.0, 0.0, 0.0])
            .unwrap();

        assert_eq!(index.len(), 1);
        let results = index.search(&[0.0, 1.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(results[0].chunk.text, "world");
    }

    #[test]
    fn remove_entry() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("c1", "d", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();

        assert!(index.remove("c1"));
        assert!(!index.remove("c1"));
        assert!(index.is_empty());
    }

    #[test]
    fn remove_document_drops_all_chunks() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("a#chunk_0", "a", "one"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("a#chunk_1", "a", "two"), vec![0.0, 1.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("b#chunk_0", "b", "three"), vec![0.0, 0.0, 1.0, 0.0])
            .unwrap();

        assert_eq!(index.remove_document("a"), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove_document("a"), 0);

        let results = index.search(&[0.0, 0.0, 1.0, 0.0], 5, 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_id, "b");
    }

    #[test]
    fn threshold_filters_low_scores() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("c1", "d", "near"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c2", "d", "far"), vec![-1.0, 0.0, 0.0, 0.0])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 10, 0.9).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c1");
    }

    #[test]
    fn load_replaces_contents() {
        let index = HnswIndex::new(4);
        index
            .insert(make_chunk("old", "d", "old"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();

        let entries = vec![
            IndexEntry::new(make_chunk("c1", "d", "hello"), vec![1.0, 0.0, 0.0, 0.0]),
            IndexEntry::new(make_chunk("c2", "d", "world"), vec![0.0, 1.0, 0.0, 0.0]),
        ];
        index.load(entries).unwrap();

        assert_eq!(index.len(), 2);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(results[0].chunk.id, "c1");
    }

    #[test]
    fn contains_hash_tracks_content() {
        let index = HnswIndex::new(4);
        let hash = crate::dedup::content_hash("hello");

        assert!(!index.contains_hash(hash));
        index
            .insert(make_chunk("c1", "d", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert!(index.contains_hash(hash));
    }
}

//! Core types for the retrieval engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key/value metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, String>;

/// A document to be ingested into the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier for the document.
    pub id: String,
    /// Raw text content.
    pub text: String,
    /// Arbitrary metadata inherited by the document's chunks.
    pub metadata: Metadata,
}

impl Document {
    /// Creates a new document with empty metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a new document with metadata.
    #[must_use]
    pub fn with_metadata(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded span of a document's text, the unit of embedding and
/// retrieval.
///
/// Chunk content stays within the configured maximum size except when a
/// single indivisible unit (one long sentence, one long line) exceeds
/// it; such units are kept whole rather than cut mid-content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (format: `{document_id}#chunk_{n}`).
    pub id: String,
    /// Text content of the chunk.
    pub text: String,
    /// Owning document ID.
    pub source_id: String,
    /// Ordinal of this chunk within the document.
    pub index: usize,
    /// Inherited and chunk-specific metadata (sentence counts, line
    /// ranges, detected language).
    pub metadata: Metadata,
    /// Content hash for staleness detection and deduplication.
    pub content_hash: u64,
    /// When the chunk was created during ingestion.
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Creates a new chunk, stamped now.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source_id: impl Into<String>,
        index: usize,
        content_hash: u64,
    ) -> Self {
        Self::with_metadata(id, text, source_id, index, content_hash, Metadata::new())
    }

    /// Creates a new chunk with metadata, stamped now.
    #[must_use]
    pub fn with_metadata(
        id: impl Into<String>,
        text: impl Into<String>,
        source_id: impl Into<String>,
        index: usize,
        content_hash: u64,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            index,
            metadata,
            content_hash,
            created_at: Utc::now(),
        }
    }
}

/// A search hit: a chunk plus its similarity score.
///
/// Scores lie in `(0.0, 1.0]`; `1.0` is a perfect match and values
/// decay smoothly with distance. Results are transient projections,
/// created per query and never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matching chunk.
    pub chunk: Chunk,
    /// Similarity score (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    /// Returns the ID of the document the matching chunk belongs to.
    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.chunk.source_id
    }
}

/// Internal entry stored in the vector index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The chunk.
    pub chunk: Chunk,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Creates a new index entry.
    #[must_use]
    pub const fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// Outcome of a successful ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// The document's identifier (caller-supplied or content-derived).
    pub document_id: String,
    /// Number of chunks produced and indexed.
    pub chunk_count: usize,
    /// `true` when the fallback encoder produced the vectors, i.e. the
    /// document was indexed at reduced embedding quality.
    pub degraded: bool,
}

/// Aggregate statistics about an ingested document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document identifier.
    pub id: String,
    /// Character length of the full text (chunk-derived after a
    /// restart, when the full text is no longer held in memory).
    pub length: usize,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// Preview of the first chunk (up to 100 characters).
    pub preview: String,
    /// When the first chunk was created.
    pub ingested_at: DateTime<Utc>,
}

//! The retrieval engine: ingestion, search, and summaries.

use std::cmp::Reverse;
use std::collections::HashMap;

use lodestone_core::{EmbeddingModel, TokenEstimator, Turn};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;

use crate::chunking::{Chunker, CodeChunker, ContentKind, SentenceChunker};
use crate::config::{RagConfig, SENTENCE_OVERLAP};
use crate::context::ContextWindow;
use crate::dedup::derived_document_id;
use crate::embedder::ResilientEmbedder;
use crate::error::{RagError, Result};
use crate::index::{HnswIndex, VectorIndex};
use crate::persistence::{Persistence, SnapshotWal};
use crate::types::{Document, DocumentSummary, IndexEntry, IngestReceipt, Metadata, SearchResult};

/// The retrieval engine.
///
/// Composes the chunkers, the embedding frontend, the vector index, and
/// the persistence backend behind a small API:
///
/// - [`ingest`](Self::ingest) — chunk, embed, and index a document
/// - [`retrieve`](Self::retrieve) / [`retrieve_with_k`](Self::retrieve_with_k)
///   — embed a query and return the best matching chunks
/// - [`document_summary`](Self::document_summary) — aggregate stats for
///   an ingested document
///
/// Engines are explicitly constructed and passed by reference; there is
/// no process-wide instance. All mutable state (the index arena, the
/// full-document store) sits behind single-writer locks, so a shared
/// engine supports concurrent readers safely.
///
/// # Example
///
/// ```rust,no_run
/// use lodestone_rag::{DigestEmbedder, RetrievalEngine};
///
/// # async fn example() -> lodestone_rag::Result<()> {
/// let engine = RetrievalEngine::builder(None::<DigestEmbedder>).build();
/// let receipt = engine.ingest("Rust is a systems language.", None, None).await?;
/// let hits = engine.retrieve("systems").await?;
/// # Ok(())
/// # }
/// ```
pub struct RetrievalEngine<M: EmbeddingModel, P: Persistence = SnapshotWal> {
    config: RagConfig,
    embedder: ResilientEmbedder<M>,
    index: HnswIndex,
    persistence: P,
    prose_chunker: SentenceChunker,
    code_chunker: CodeChunker,
    context: ContextWindow,
    documents: RwLock<HashMap<String, String>>,
}

impl<M: EmbeddingModel, P: Persistence> std::fmt::Debug for RetrievalEngine<M, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("index", &self.index)
            .field("config", &self.config)
            .field("has_primary", &self.embedder.has_primary())
            .finish_non_exhaustive()
    }
}

impl<M> RetrievalEngine<M, SnapshotWal>
where
    M: EmbeddingModel + Send + Sync + 'static,
{
    /// Creates an engine with default configuration.
    ///
    /// `primary` is the embedding model to prefer; pass `None` to run
    /// on the deterministic fallback encoder only.
    #[must_use]
    pub fn new(primary: Option<M>) -> Self {
        Self::builder(primary).build()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder(primary: Option<M>) -> RetrievalEngineBuilder<M> {
        RetrievalEngineBuilder::new(primary)
    }
}

impl<M, P> RetrievalEngine<M, P>
where
    M: EmbeddingModel + Send + Sync + 'static,
    P: Persistence,
{
    fn with_parts(
        primary: Option<M>,
        config: RagConfig,
        persistence: P,
        estimator: Option<Box<dyn TokenEstimator>>,
    ) -> Self {
        let embedder = ResilientEmbedder::new(primary, config.embedding_dim);
        let index = HnswIndex::new(embedder.dim());
        let context = match estimator {
            Some(estimator) => ContextWindow::with_estimator(config.max_context_tokens, estimator),
            None => ContextWindow::new(config.max_context_tokens),
        };

        let engine = Self {
            prose_chunker: SentenceChunker::new(config.chunk_size, SENTENCE_OVERLAP),
            code_chunker: CodeChunker::new(config.chunk_overlap),
            context,
            embedder,
            index,
            persistence,
            config,
            documents: RwLock::new(HashMap::new()),
        };
        engine.restore();
        engine
    }

    /// Reloads persisted state; a failed load is logged and the engine
    /// starts empty.
    fn restore(&self) {
        match self.persistence.load() {
            Ok(entries) if entries.is_empty() => {}
            Ok(entries) => {
                let count = entries.len();
                if let Err(err) = self.index.load(entries) {
                    tracing::warn!("persisted entries rejected, starting empty: {err}");
                    self.index.clear();
                } else {
                    tracing::info!(chunks = count, "restored index");
                }
            }
            Err(err) => {
                tracing::error!("failed to load persisted index, starting empty: {err}");
            }
        }
    }

    /// Ingests a document: classify, chunk, embed, and index.
    ///
    /// When `id` is absent a stable content-derived id is assigned.
    /// Each chunk is durably logged before this call returns, in chunk
    /// order, so a retrieval issued after `ingest` completes sees the
    /// whole document.
    ///
    /// # Errors
    /// Returns [`RagError::InvalidInput`] for empty content (nothing is
    /// mutated). Embedding failures do not error; the receipt's
    /// `degraded` flag reports fallback encoding.
    pub async fn ingest(
        &self,
        content: &str,
        id: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<IngestReceipt> {
        if content.trim().is_empty() {
            return Err(RagError::InvalidInput("document content is empty".into()));
        }

        let document_id = id.unwrap_or_else(|| derived_document_id(content));
        let doc = Document::with_metadata(&document_id, content, metadata.unwrap_or_default());

        let chunks = match ContentKind::detect(content) {
            ContentKind::Code => self.code_chunker.chunk(&doc)?,
            ContentKind::Prose => self.prose_chunker.chunk(&doc)?,
        };

        self.documents
            .write()
            .insert(document_id.clone(), content.to_string());

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let (vectors, degraded) = self.embedder.encode(&texts).await;

        let mut indexed = 0;
        for (chunk, embedding) in chunks.into_iter().zip(vectors) {
            if self.config.deduplication && self.index.contains_hash(chunk.content_hash) {
                continue;
            }

            self.index.insert(chunk.clone(), embedding.clone())?;
            let entry = IndexEntry::new(chunk, embedding);
            if let Err(err) = self.persistence.append(&entry) {
                tracing::warn!("failed to log chunk {}: {err}", entry.chunk.id);
            }
            indexed += 1;
        }

        if self.persistence.pending() >= self.config.wal_snapshot_threshold {
            self.checkpoint();
        }

        tracing::info!(document = %document_id, chunks = indexed, degraded, "ingested document");
        Ok(IngestReceipt {
            document_id,
            chunk_count: indexed,
            degraded,
        })
    }

    /// Retrieves the best matching chunks for a query using the
    /// configured default result count.
    ///
    /// # Errors
    /// Returns [`RagError::InvalidInput`] for an empty query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_with_k(query, self.config.default_top_k).await
    }

    /// Retrieves up to `k` matching chunks, ordered by descending
    /// similarity. A query against an empty index returns no results.
    ///
    /// # Errors
    /// Returns [`RagError::InvalidInput`] for an empty query.
    pub async fn retrieve_with_k(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query is empty".into()));
        }

        let (embedding, degraded) = self.embedder.encode_one(query).await;
        if degraded && self.embedder.has_primary() {
            tracing::warn!("query embedded with the fallback encoder");
        }

        let mut results = self
            .index
            .search(&embedding, k, self.config.similarity_threshold)?;

        // The index already orders hits, but don't rely on it.
        results.sort_by_key(|result| Reverse(OrderedFloat(result.score)));
        Ok(results)
    }

    /// Returns aggregate statistics for an ingested document, or `None`
    /// when the id is unknown.
    ///
    /// Scans the indexed chunks linearly; fine for the hundreds to low
    /// thousands of chunks this engine targets.
    #[must_use]
    pub fn document_summary(&self, document_id: &str) -> Option<DocumentSummary> {
        let mut chunks: Vec<_> = self
            .index
            .entries()
            .into_iter()
            .filter(|entry| entry.chunk.source_id == document_id)
            .map(|entry| entry.chunk)
            .collect();
        if chunks.is_empty() {
            return None;
        }
        chunks.sort_by_key(|chunk| chunk.index);

        let length = self.documents.read().get(document_id).map_or_else(
            || chunks.iter().map(|chunk| chunk.text.len()).sum(),
            String::len,
        );

        let first = &chunks[0];
        let preview: String = if first.text.chars().count() > 100 {
            let mut p: String = first.text.chars().take(100).collect();
            p.push_str("...");
            p
        } else {
            first.text.clone()
        };

        Some(DocumentSummary {
            id: document_id.to_string(),
            length,
            chunk_count: chunks.len(),
            preview,
            ingested_at: first.created_at,
        })
    }

    /// Removes a document and all of its chunks.
    ///
    /// Returns `true` when anything was removed. The persisted
    /// artifacts are rewritten so the removal survives a restart.
    ///
    /// # Errors
    /// Returns a persistence error if the rewritten snapshot cannot be
    /// stored; the in-memory removal has already happened.
    pub fn remove_document(&self, document_id: &str) -> Result<bool> {
        let removed = self.index.remove_document(document_id);
        self.documents.write().remove(document_id);

        if removed == 0 {
            return Ok(false);
        }
        self.persistence.snapshot(&self.index.entries())?;
        tracing::info!(document = %document_id, chunks = removed, "removed document");
        Ok(true)
    }

    /// Prefixes a query with the retrieved context blocks.
    ///
    /// With no results the query is returned unchanged.
    #[must_use]
    pub fn augment_query(&self, query: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return query.to_string();
        }

        let mut augmented = String::from("Retrieved context:\n");
        for result in results {
            augmented.push_str("Document: ");
            augmented.push_str(result.document_id());
            augmented.push('\n');
            augmented.push_str("Content: ");
            augmented.push_str(&result.chunk.text);
            augmented.push_str("\n---\n");
        }
        augmented.push_str("\nOriginal question: ");
        augmented.push_str(query);
        augmented
    }

    /// Fits a conversation (plus retrieved context) into the token
    /// budget. See [`ContextWindow::truncate`].
    #[must_use]
    pub fn truncate_history(&self, turns: &[Turn], retrieved: &[SearchResult]) -> Vec<Turn> {
        self.context.truncate(turns, retrieved)
    }

    /// Returns the context-window manager.
    #[must_use]
    pub const fn context_window(&self) -> &ContextWindow {
        &self.context
    }

    /// Writes a fresh snapshot of the whole index.
    ///
    /// # Errors
    /// Returns a persistence error when the artifacts cannot be
    /// written.
    pub fn save(&self) -> Result<()> {
        self.persistence.snapshot(&self.index.entries())
    }

    /// Snapshot with contained failure, for the automatic cadence.
    fn checkpoint(&self) {
        if let Err(err) = self.persistence.snapshot(&self.index.entries()) {
            tracing::warn!("snapshot failed, WAL retained: {err}");
        }
    }

    /// Returns the number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Returns the embedding dimension in use.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedder.dim()
    }
}

/// Builder for [`RetrievalEngine`].
pub struct RetrievalEngineBuilder<M: EmbeddingModel> {
    primary: Option<M>,
    config: RagConfig,
    estimator: Option<Box<dyn TokenEstimator>>,
}

impl<M: EmbeddingModel> std::fmt::Debug for RetrievalEngineBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngineBuilder")
            .field("config", &self.config)
            .field("has_primary", &self.primary.is_some())
            .finish_non_exhaustive()
    }
}

impl<M> RetrievalEngineBuilder<M>
where
    M: EmbeddingModel + Send + Sync + 'static,
{
    fn new(primary: Option<M>) -> Self {
        Self {
            primary,
            config: RagConfig::default(),
            estimator: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the base path for the persisted index artifacts.
    #[must_use]
    pub fn index_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Sets the embedding dimension used when no primary model decides
    /// it.
    #[must_use]
    pub const fn embedding_dim(mut self, dim: usize) -> Self {
        self.config.embedding_dim = dim;
        self
    }

    /// Sets the maximum chunk size in characters.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Sets the chunk overlap window.
    #[must_use]
    pub const fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Sets the context-window token budget.
    #[must_use]
    pub const fn max_context_tokens(mut self, tokens: usize) -> Self {
        self.config.max_context_tokens = tokens;
        self
    }

    /// Sets the minimum similarity score for results.
    #[must_use]
    pub const fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Sets the default number of results.
    #[must_use]
    pub const fn top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Enables or disables content deduplication.
    #[must_use]
    pub const fn deduplication(mut self, enabled: bool) -> Self {
        self.config.deduplication = enabled;
        self
    }

    /// Sets the WAL append count that triggers a snapshot.
    #[must_use]
    pub const fn wal_snapshot_threshold(mut self, appends: usize) -> Self {
        self.config.wal_snapshot_threshold = appends;
        self
    }

    /// Uses a custom token estimator for the context window (e.g. a
    /// real tokenizer).
    #[must_use]
    pub fn token_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Some(Box::new(estimator));
        self
    }

    /// Builds the engine with file persistence at the configured index
    /// path.
    #[must_use]
    pub fn build(self) -> RetrievalEngine<M, SnapshotWal> {
        let persistence = SnapshotWal::new(&self.config.index_path);
        RetrievalEngine::with_parts(self.primary, self.config, persistence, self.estimator)
    }

    /// Builds the engine with a custom persistence backend.
    pub fn build_with_persistence<P: Persistence>(self, persistence: P) -> RetrievalEngine<M, P> {
        RetrievalEngine::with_parts(self.primary, self.config, persistence, self.estimator)
    }
}

//! Retrieval engine for grounding chat responses in ingested text.
//!
//! The [`RetrievalEngine`] composes four pieces behind a small API:
//!
//! - **Chunking** ([`chunking`]): prose is split at sentence boundaries
//!   and code at structural boundaries, with configurable overlap so
//!   neighboring chunks keep shared context.
//! - **Embedding** ([`embedder`]): any
//!   [`EmbeddingModel`](lodestone_core::EmbeddingModel) can serve as
//!   the primary encoder; a deterministic digest encoder keeps the
//!   engine usable when no model is available.
//! - **Indexing** ([`index`]): approximate nearest-neighbor search over
//!   an HNSW graph with dense, collision-free chunk addressing.
//! - **Persistence** ([`persistence`]): a write-ahead log plus periodic
//!   snapshots, so no indexed chunk is lost across a crash.
//!
//! The [`context`] module rounds the crate out with the token-budgeted
//! sliding window applied to conversation histories.
//!
//! ```rust,no_run
//! use lodestone_rag::{DigestEmbedder, RetrievalEngine};
//!
//! # async fn example() -> lodestone_rag::Result<()> {
//! let engine = RetrievalEngine::builder(None::<DigestEmbedder>)
//!     .index_path("./index.bin")
//!     .build();
//!
//! engine.ingest("Chunking splits documents into passages.", None, None).await?;
//! for hit in engine.retrieve("how are documents split?").await? {
//!     println!("{:.3} {}", hit.score, hit.chunk.text);
//! }
//! # Ok(())
//! # }
//! ```

/// Chunking strategies and content-kind detection.
pub mod chunking;
/// Engine configuration.
pub mod config;
/// Token-budgeted conversation windows.
pub mod context;
/// Content hashing.
pub mod dedup;
/// Fallback embedding and failure recovery.
pub mod embedder;
/// The engine itself.
pub mod engine;
/// Error types.
pub mod error;
/// Vector index implementations.
pub mod index;
/// Durable index storage.
pub mod persistence;
/// Core data types.
pub mod types;

#[doc(inline)]
pub use config::RagConfig;
#[doc(inline)]
pub use context::ContextWindow;
#[doc(inline)]
pub use embedder::{DigestEmbedder, ResilientEmbedder};
#[doc(inline)]
pub use engine::{RetrievalEngine, RetrievalEngineBuilder};
#[doc(inline)]
pub use error::{RagError, Result};
#[doc(inline)]
pub use types::{
    Chunk, Document, DocumentSummary, IndexEntry, IngestReceipt, Metadata, SearchResult,
};

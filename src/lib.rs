//! # lodestone
//!
//! Local retrieval for chat orchestration: structure-aware chunking,
//! embeddings, approximate nearest-neighbor search, and token-budgeted
//! context windows.
//!
//! This facade crate re-exports the workspace members:
//!
//! - [`lodestone_core`] — shared trait abstractions
//!   ([`EmbeddingModel`], [`TokenEstimator`]) and conversation types
//! - [`lodestone_rag`] — the retrieval engine
//!   ([`RetrievalEngine`]): ingest, retrieve, summarize
//! - `lodestone-ort` (feature `ort`) — local ONNX embedding models
//!
//! ```rust,no_run
//! use lodestone::{DigestEmbedder, RetrievalEngine};
//!
//! # async fn example() -> lodestone::Result<()> {
//! let engine = RetrievalEngine::builder(None::<DigestEmbedder>).build();
//! engine.ingest("Lodestones point the way.", None, None).await?;
//! let hits = engine.retrieve("what points the way?").await?;
//! # Ok(())
//! # }
//! ```

#[doc(inline)]
pub use lodestone_core::{
    CharEstimator, Embedding, EmbeddingModel, Role, TokenEstimator, Turn,
};

#[doc(inline)]
pub use lodestone_rag::{
    Chunk, ContextWindow, DigestEmbedder, Document, DocumentSummary, IngestReceipt, Metadata,
    RagConfig, RagError, ResilientEmbedder, Result, RetrievalEngine, SearchResult,
};

#[cfg(feature = "ort")]
#[doc(inline)]
pub use lodestone_ort::{OrtEmbedder, PoolingStrategy};

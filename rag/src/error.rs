//! Error types for the retrieval engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in retrieval-engine operations.
///
/// Only [`InvalidInput`](RagError::InvalidInput) reaches callers of the
/// engine's ingest/retrieve surface; embedding failures are recovered
/// via the fallback encoder and persistence failures degrade to an
/// empty index at load time.
#[derive(Debug, Error)]
pub enum RagError {
    /// Vector index operation failed.
    #[error("index error: {0}")]
    Index(String),

    /// Persistence operation failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Dimension mismatch between embedding and index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// Chunking operation failed.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// Caller supplied invalid input (empty content, empty query).
    /// Nothing was mutated.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for retrieval-engine operations.
pub type Result<T> = std::result::Result<T, RagError>;

//! Configuration for the retrieval engine.

use std::env;
use std::path::PathBuf;

/// Configuration for a [`RetrievalEngine`](crate::engine::RetrievalEngine).
///
/// Every field has a working default; each is independently overridable
/// through the builder or through the environment (see
/// [`RagConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Directory holding the local embedding model, if one is
    /// configured (`EMBEDDING_MODEL`).
    pub embedding_model: Option<PathBuf>,
    /// Embedding vector dimension (`EMBEDDING_DIM`).
    pub embedding_dim: usize,
    /// Maximum chunk size in characters (`CHUNK_SIZE`).
    pub chunk_size: usize,
    /// Overlap window between consecutive chunks: trailing sentences
    /// for prose, lookback lines for code (`CHUNK_OVERLAP`).
    pub chunk_overlap: usize,
    /// Token budget for the context window (`MAX_CONTEXT_TOKENS`).
    pub max_context_tokens: usize,
    /// Base path for the persisted index artifacts (`INDEX_FILE`).
    pub index_path: PathBuf,
    /// Minimum similarity score for search results.
    pub similarity_threshold: f32,
    /// Default number of results to return.
    pub default_top_k: usize,
    /// Whether to skip chunks whose content is already indexed.
    pub deduplication: bool,
    /// Number of write-ahead-log appends that triggers a snapshot.
    pub wal_snapshot_threshold: usize,
}

/// Number of trailing sentences carried into the next prose chunk.
pub const SENTENCE_OVERLAP: usize = 2;

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: None,
            embedding_dim: 384,
            chunk_size: 512,
            chunk_overlap: 64,
            max_context_tokens: 4096,
            index_path: PathBuf::from("./lodestone_index.bin"),
            similarity_threshold: 0.0,
            default_top_k: 5,
            deduplication: false,
            wal_snapshot_threshold: 64,
        }
    }
}

impl RagConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::new()
    }

    /// Builds a configuration from the environment, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `EMBEDDING_MODEL`, `EMBEDDING_DIM`,
    /// `CHUNK_SIZE`, `CHUNK_OVERLAP`, `MAX_CONTEXT_TOKENS`,
    /// `INDEX_FILE`. Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            if !model.is_empty() {
                config.embedding_model = Some(PathBuf::from(model));
            }
        }
        if let Some(dim) = parse_var("EMBEDDING_DIM") {
            config.embedding_dim = dim;
        }
        if let Some(size) = parse_var("CHUNK_SIZE") {
            config.chunk_size = size;
        }
        if let Some(overlap) = parse_var("CHUNK_OVERLAP") {
            config.chunk_overlap = overlap;
        }
        if let Some(tokens) = parse_var("MAX_CONTEXT_TOKENS") {
            config.max_context_tokens = tokens;
        }
        if let Ok(path) = env::var("INDEX_FILE") {
            if !path.is_empty() {
                config.index_path = PathBuf::from(path);
            }
        }

        config
    }
}

fn parse_var(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring unparseable {name}={raw}");
            None
        }
    }
}

/// Builder for [`RagConfig`].
#[derive(Debug, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RagConfig::default(),
        }
    }

    /// Sets the local embedding model directory.
    #[must_use]
    pub fn embedding_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.embedding_model = Some(path.into());
        self
    }

    /// Sets the embedding dimension.
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

    /// Sets the base path for the persisted index artifacts.
    #[must_use]
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Sets the minimum similarity threshold for search results.
    #[must_use]
    pub const fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Sets the default number of results to return.
    #[must_use]
    pub const fn default_top_k(mut self, k: usize) -> Self {
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

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RagConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RagConfig::default();
        assert_eq!(config.embedding_dim, 384);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 64);
        assert_eq!(config.max_context_tokens, 4096);
        assert_eq!(config.default_top_k, 5);
        assert!(config.embedding_model.is_none());
        assert!(!config.deduplication);
    }

    #[test]
    fn builder_config() {
        let config = RagConfig::builder()
            .embedding_dim(768)
            .chunk_size(256)
            .chunk_overlap(16)
            .max_context_tokens(2048)
            .index_path("/tmp/custom.bin")
            .similarity_threshold(0.5)
            .default_top_k(10)
            .deduplication(true)
            .wal_snapshot_threshold(8)
            .build();

        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.chunk_overlap, 16);
        assert_eq!(config.max_context_tokens, 2048);
        assert_eq!(config.index_path, PathBuf::from("/tmp/custom.bin"));
        assert_eq!(config.default_top_k, 10);
        assert!(config.deduplication);
        assert_eq!(config.wal_snapshot_threshold, 8);
    }

    #[test]
    fn from_env_overrides() {
        // SAFETY: single-threaded access to process env within this test.
        unsafe {
            env::set_var("CHUNK_SIZE", "128");
            env::set_var("EMBEDDING_DIM", "not-a-number");
        }
        let config = RagConfig::from_env();
        unsafe {
            env::remove_var("CHUNK_SIZE");
            env::remove_var("EMBEDDING_DIM");
        }

        assert_eq!(config.chunk_size, 128);
        // Unparseable values fall back to the default.
        assert_eq!(config.embedding_dim, 384);
    }
}

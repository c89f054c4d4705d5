//! Local ONNX Runtime embedding models for lodestone.
//!
//! [`OrtEmbedder`] implements [`lodestone_core::EmbeddingModel`] by
//! running a sentence-embedding model locally through ONNX Runtime. The
//! model and its `tokenizer.json` are loaded once at startup; inputs
//! are tokenized with truncation at a fixed token budget and pooled
//! (CLS by default) into the model's output dimension.
//!
//! The embedder also implements
//! [`lodestone_core::TokenEstimator`], so the same tokenizer that feeds
//! the model can give exact token counts to the context-window manager.
//!
//! # Example
//!
//! ```rust,no_run
//! use lodestone_core::EmbeddingModel;
//! use lodestone_ort::OrtEmbedder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let embedder = OrtEmbedder::from_directory("./models/bge-small-en-v1.5")?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! assert_eq!(embedding.len(), embedder.dim());
//! # Ok(())
//! # }
//! ```

mod error;
mod pooling;

pub use error::OrtError;
pub use pooling::PoolingStrategy;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lodestone_core::{EmbeddingModel, TokenEstimator};
use ndarray::Ix3;
use ort::session::{Session, builder::GraphOptimizationLevel};
use tokenizers::{Tokenizer, TruncationParams};

/// Default token budget applied when tokenizing inputs.
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// A sentence-embedding model backed by ONNX Runtime.
///
/// Construct with [`from_directory`](OrtEmbedder::from_directory) for
/// the common `model.onnx` + `tokenizer.json` layout, or through the
/// [`builder`](OrtEmbedder::builder) for full control over pooling,
/// normalization, truncation, and dimension checking.
pub struct OrtEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    pooling: PoolingStrategy,
    normalize: bool,
}

impl std::fmt::Debug for OrtEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEmbedder")
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

impl OrtEmbedder {
    /// Loads an embedding model from a directory.
    ///
    /// Locates `model.onnx` (directly or under an `onnx/` subdirectory)
    /// and `tokenizer.json` within the directory.
    ///
    /// # Errors
    /// Returns an error if either file cannot be found or loaded.
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, OrtError> {
        let dir = path.as_ref();
        Self::builder()
            .model_path(find_model_file(dir)?)
            .tokenizer_path(find_tokenizer_file(dir)?)
            .build()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> OrtEmbedderBuilder {
        OrtEmbedderBuilder::default()
    }

    /// Returns the pooling strategy.
    #[must_use]
    pub const fn pooling(&self) -> PoolingStrategy {
        self.pooling
    }

    /// Returns whether L2 normalization is enabled.
    #[must_use]
    pub const fn normalize(&self) -> bool {
        self.normalize
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>, OrtError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| OrtError::Tokenization(e.to_string()))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| i64::from(m))
            .collect();
        let seq_len = input_ids.len();

        let input_ids_tensor =
            ort::value::Tensor::from_array(([1, seq_len], input_ids.into_boxed_slice()))
                .map_err(OrtError::from)?;
        let attention_mask_tensor =
            ort::value::Tensor::from_array(([1, seq_len], attention_mask.into_boxed_slice()))
                .map_err(OrtError::from)?;

        // Run inference and copy the hidden states out before releasing
        // the session lock.
        let hidden_states = {
            let mut session = self.session.lock().expect("session lock poisoned");
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor,
                ])
                .map_err(OrtError::from)?;

            let hidden = outputs
                .get("last_hidden_state")
                .or_else(|| outputs.get("hidden_states"))
                .or_else(|| outputs.get("output"))
                .ok_or(OrtError::InvalidOutputShape(0))?;

            hidden
                .try_extract_array::<f32>()
                .map_err(OrtError::from)?
                .to_owned()
        };

        let shape_len = hidden_states.shape().len();
        if shape_len != 3 {
            return Err(OrtError::InvalidOutputShape(shape_len));
        }
        let view = hidden_states
            .into_dimensionality::<Ix3>()
            .map_err(|e| OrtError::Shape(e.to_string()))?;

        let mask: Vec<u32> = encoding.get_attention_mask().to_vec();
        let mut embedding = self.pooling.apply(&view.view(), &mask);

        if self.normalize {
            l2_normalize(&mut embedding);
        }
        Ok(embedding)
    }
}

impl EmbeddingModel for OrtEmbedder {
    fn dim(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> lodestone_core::Result<Vec<f32>> {
        Ok(self.encode_text(text)?)
    }
}

impl TokenEstimator for OrtEmbedder {
    fn estimate(&self, text: &str) -> usize {
        // Exact counts from the model's own tokenizer; approximate on
        // tokenization failure rather than erroring.
        self.tokenizer
            .encode(text, false)
            .map_or_else(|_| text.chars().count() / 4, |enc| enc.get_ids().len())
    }
}

/// Builder for [`OrtEmbedder`].
#[derive(Debug)]
pub struct OrtEmbedderBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    pooling: PoolingStrategy,
    normalize: bool,
    max_tokens: usize,
    expected_dim: Option<usize>,
}

impl Default for OrtEmbedderBuilder {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            pooling: PoolingStrategy::default(),
            normalize: true,
            max_tokens: DEFAULT_MAX_TOKENS,
            expected_dim: None,
        }
    }
}

impl OrtEmbedderBuilder {
    /// Sets the path to the ONNX model file.
    #[must_use]
    pub fn model_path(mut self, path: impl AsRef<Path>) -> Self {
        self.model_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the path to the `tokenizer.json` file.
    #[must_use]
    pub fn tokenizer_path(mut self, path: impl AsRef<Path>) -> Self {
        self.tokenizer_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the pooling strategy (default: [`PoolingStrategy::Cls`]).
    #[must_use]
    pub const fn pooling(mut self, strategy: PoolingStrategy) -> Self {
        self.pooling = strategy;
        self
    }

    /// Enables or disables L2 normalization (default: enabled).
    #[must_use]
    pub const fn normalize(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    /// Sets the token budget for input truncation (default: 512).
    #[must_use]
    pub const fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Requires the model to produce embeddings of this dimension.
    ///
    /// Building fails when the model's detected output dimension
    /// disagrees, instead of silently indexing mismatched vectors.
    #[must_use]
    pub const fn expected_dim(mut self, dim: usize) -> Self {
        self.expected_dim = Some(dim);
        self
    }

    /// Builds the [`OrtEmbedder`].
    ///
    /// # Errors
    /// Returns an error when the model or tokenizer cannot be loaded,
    /// the output dimension cannot be detected, or it disagrees with
    /// [`expected_dim`](Self::expected_dim).
    pub fn build(self) -> Result<OrtEmbedder, OrtError> {
        let model_path = self.model_path.ok_or(OrtError::MissingModelPath)?;
        if !model_path.exists() {
            return Err(OrtError::ModelNotFound(model_path));
        }

        let tokenizer_path = self.tokenizer_path.ok_or_else(|| {
            OrtError::TokenizerNotFound(model_path.parent().unwrap_or(&model_path).to_path_buf())
        })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| OrtError::tokenizer(&tokenizer_path, e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: self.max_tokens,
                ..TruncationParams::default()
            }))
            .map_err(|e| OrtError::tokenizer(&tokenizer_path, e))?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus())?
            .commit_from_file(&model_path)?;

        let dimension = detect_embedding_dimension(&session)?;
        if let Some(expected) = self.expected_dim {
            if expected != dimension {
                return Err(OrtError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }

        tracing::info!(
            model = %model_path.display(),
            dimension,
            pooling = ?self.pooling,
            "loaded embedding model"
        );

        Ok(OrtEmbedder {
            session: Mutex::new(session),
            tokenizer,
            dimension,
            pooling: self.pooling,
            normalize: self.normalize,
        })
    }
}

/// L2-normalizes a vector in place.
fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Finds the ONNX model file in a directory.
fn find_model_file(dir: &Path) -> Result<PathBuf, OrtError> {
    let candidates = [dir.join("model.onnx"), dir.join("onnx/model.onnx")];
    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }

    for search_dir in [dir.to_path_buf(), dir.join("onnx")] {
        if let Ok(entries) = std::fs::read_dir(&search_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "onnx") {
                    return Ok(path);
                }
            }
        }
    }

    Err(OrtError::ModelNotFound(dir.to_path_buf()))
}

/// Finds the `tokenizer.json` file in a directory.
fn find_tokenizer_file(dir: &Path) -> Result<PathBuf, OrtError> {
    let candidates = [dir.join("tokenizer.json"), dir.join("onnx/tokenizer.json")];
    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }
    Err(OrtError::TokenizerNotFound(dir.to_path_buf()))
}

/// Detects the embedding dimension from the model's output metadata.
fn detect_embedding_dimension(session: &Session) -> Result<usize, OrtError> {
    for output in session.outputs() {
        if let ort::value::ValueType::Tensor { shape, .. } = output.dtype() {
            // Expect [batch, seq_len, hidden_dim] or [batch, hidden_dim];
            // the last dimension is the hidden size.
            if shape.len() >= 2 {
                if let Some(&dim) = shape.last() {
                    if dim > 0 {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        return Ok(dim as usize);
                    }
                }
            }
        }
    }
    Err(OrtError::InvalidOutputShape(0))
}

/// Number of CPU cores available for intra-op parallelism.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(4)
}

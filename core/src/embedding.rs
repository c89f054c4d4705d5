//! Text embedding abstractions.
//!
//! An embedding model turns text into a dense vector whose geometry
//! reflects semantic similarity: texts about the same thing land close
//! together. The retrieval engine compares these vectors to find the
//! stored chunks most relevant to a query.
//!
//! Implementations range from full transformer models (see the
//! `lodestone-ort` crate) down to the deterministic digest encoder the
//! retrieval engine falls back to when no model is available.

use core::future::Future;

/// An embedding vector of 32-bit floats.
///
/// The length is fixed per model and reported by
/// [`EmbeddingModel::dim`]; vectors are never mutated after creation.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// # Implementation Requirements
///
/// - [`embed`](EmbeddingModel::embed) must return vectors with length
///   equal to [`dim`](EmbeddingModel::dim).
/// - Identical input should produce identical output for deterministic
///   backends; model-backed implementations may not guarantee this.
/// - Errors (model failures, I/O) are reported through the returned
///   `Result`; callers decide whether to recover or degrade.
pub trait EmbeddingModel: Send + Sync + Sized {
    /// Returns the embedding vector dimension.
    fn dim(&self) -> usize;

    /// Converts a single text to an embedding vector.
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;

    /// Converts a batch of texts to embedding vectors, one per input,
    /// preserving input order.
    ///
    /// The default implementation embeds sequentially; backends with
    /// native batch inference should override it.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }
}

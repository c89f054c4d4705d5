//! Fallback embedding and failure recovery.
//!
//! The engine prefers a real embedding model (any
//! [`EmbeddingModel`], e.g. the ONNX backend from `lodestone-ort`),
//! but it must keep ingesting and retrieving when no model is
//! available or a model call fails at runtime. [`ResilientEmbedder`]
//! implements that policy: try the primary per batch, recover with the
//! deterministic [`DigestEmbedder`], and never surface an embedding
//! failure to the caller.

use lodestone_core::{Embedding, EmbeddingModel};
use sha2::{Digest, Sha256};

/// Deterministic digest-based encoder.
///
/// Computes a SHA-256 digest of the text and expands its hex digits
/// cyclically to fill the target dimension, normalizing each digit into
/// `[0, 1]`. Identical input always yields a bit-identical vector, so
/// retrieval stays usable (at reduced quality) without any model.
#[derive(Debug, Clone, Copy)]
pub struct DigestEmbedder {
    dimension: usize,
}

impl DigestEmbedder {
    /// Creates an encoder producing vectors of the given dimension.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Encodes a text synchronously.
    #[must_use]
    pub fn encode_sync(&self, text: &str) -> Embedding {
        let digest = Sha256::digest(text.as_bytes());
        let hex = format!("{digest:x}");
        let digits = hex.as_bytes();

        let mut vector = vec![0.0f32; self.dimension];
        for (i, value) in vector.iter_mut().enumerate() {
            let digit = char::from(digits[i % digits.len()]);
            let nibble = digit.to_digit(16).unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let normalized = nibble as f32 / 15.0;
            *value = normalized;
        }
        vector
    }
}

impl EmbeddingModel for DigestEmbedder {
    fn dim(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> lodestone_core::Result<Embedding> {
        Ok(self.encode_sync(text))
    }
}

/// Embedding frontend with per-batch fallback recovery.
///
/// Wraps an optional primary model and a [`DigestEmbedder`] sized to
/// the same dimension. Encoding reports whether the fallback produced
/// the vectors so callers can surface the quality degradation.
#[derive(Debug)]
pub struct ResilientEmbedder<M> {
    primary: Option<M>,
    fallback: DigestEmbedder,
}

impl<M: EmbeddingModel> ResilientEmbedder<M> {
    /// Creates a resilient embedder.
    ///
    /// When a primary model is present its dimension wins; otherwise
    /// `dimension` sizes the fallback encoder.
    #[must_use]
    pub fn new(primary: Option<M>, dimension: usize) -> Self {
        let resolved = primary.as_ref().map_or(dimension, M::dim);
        Self {
            primary,
            fallback: DigestEmbedder::new(resolved),
        }
    }

    /// Returns the embedding dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.fallback.dimension
    }

    /// Returns `true` when a primary model is configured.
    #[must_use]
    pub const fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Encodes a batch of texts, one vector per input in input order.
    ///
    /// Returns the vectors and a `degraded` flag that is `true` when
    /// the fallback encoder produced them. This method never fails: a
    /// primary-model error is logged and recovered per batch.
    pub async fn encode(&self, texts: &[String]) -> (Vec<Embedding>, bool) {
        if let Some(primary) = &self.primary {
            match primary.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => return (vectors, false),
                Ok(vectors) => {
                    tracing::warn!(
                        expected = texts.len(),
                        got = vectors.len(),
                        "primary embedder returned a short batch, using fallback"
                    );
                }
                Err(err) => {
                    tracing::warn!("primary embedding failed, using fallback: {err}");
                }
            }
        }

        let vectors = texts
            .iter()
            .map(|text| self.fallback.encode_sync(text))
            .collect();
        (vectors, true)
    }

    /// Encodes a single text. Never fails; see [`encode`](Self::encode).
    pub async fn encode_one(&self, text: &str) -> (Embedding, bool) {
        let texts = [text.to_string()];
        let (mut vectors, degraded) = self.encode(&texts).await;
        (vectors.remove(0), degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingModel;

    impl EmbeddingModel for FailingModel {
        fn dim(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> lodestone_core::Result<Embedding> {
            anyhow::bail!("model unavailable")
        }
    }

    struct WorkingModel;

    impl EmbeddingModel for WorkingModel {
        fn dim(&self) -> usize {
            4
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> lodestone_core::Result<Embedding> {
            Ok(vec![text.len() as f32; 4])
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let encoder = DigestEmbedder::new(384);
        let a = encoder.encode_sync("The same input text.");
        let b = encoder.encode_sync("The same input text.");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn digest_values_in_unit_range() {
        let encoder = DigestEmbedder::new(384);
        for value in encoder.encode_sync("range check") {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn digest_differs_across_inputs() {
        let encoder = DigestEmbedder::new(64);
        assert_ne!(encoder.encode_sync("alpha"), encoder.encode_sync("beta"));
    }

    #[test]
    fn digest_fills_past_hex_length() {
        // Dimensions beyond the 64 hex digits wrap around instead of
        // staying zero.
        let encoder = DigestEmbedder::new(128);
        let vector = encoder.encode_sync("wrap");
        assert_eq!(&vector[..64], &vector[64..]);
    }

    #[tokio::test]
    async fn primary_used_when_healthy() {
        let embedder = ResilientEmbedder::new(Some(WorkingModel), 384);
        assert_eq!(embedder.dim(), 4);

        let (vectors, degraded) = embedder.encode(&["abc".to_string()]).await;
        assert!(!degraded);
        assert_eq!(vectors[0], vec![3.0; 4]);
    }

    #[tokio::test]
    async fn recovers_from_primary_failure() {
        let embedder = ResilientEmbedder::new(Some(FailingModel), 384);
        let (vectors, degraded) = embedder.encode(&["abc".to_string(), "def".to_string()]).await;

        assert!(degraded);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 8);
        // Fallback is deterministic even on the recovery path.
        let (again, _) = embedder.encode(&["abc".to_string()]).await;
        assert_eq!(vectors[0], again[0]);
    }

    #[tokio::test]
    async fn no_primary_uses_fallback() {
        let embedder = ResilientEmbedder::<DigestEmbedder>::new(None, 16);
        assert!(!embedder.has_primary());

        let (vector, degraded) = embedder.encode_one("query").await;
        assert!(degraded);
        assert_eq!(vector.len(), 16);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = ResilientEmbedder::<DigestEmbedder>::new(None, 8);
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let (vectors, _) = embedder.encode(&texts).await;

        let solo = DigestEmbedder::new(8);
        assert_eq!(vectors[0], solo.encode_sync("one"));
        assert_eq!(vectors[1], solo.encode_sync("two"));
        assert_eq!(vectors[2], solo.encode_sync("three"));
    }
}

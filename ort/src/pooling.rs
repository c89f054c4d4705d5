//! Pooling strategies for collapsing transformer outputs into one vector.

use ndarray::ArrayView3;

/// Strategy for pooling hidden states into a single embedding vector.
///
/// Sentence-encoder models (BGE, MiniLM) typically use
/// [`Cls`](PoolingStrategy::Cls) or [`Mean`](PoolingStrategy::Mean);
/// decoder-style embedding models use
/// [`LastToken`](PoolingStrategy::LastToken).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoolingStrategy {
    /// Use the first token's hidden state (the [CLS] token).
    ///
    /// The default, matching BGE-style sentence encoders.
    #[default]
    Cls,

    /// Average all non-padding token hidden states.
    Mean,

    /// Use the last non-padding token's hidden state.
    LastToken,
}

impl PoolingStrategy {
    /// Applies the pooling strategy to hidden states of shape
    /// `[batch=1, seq_len, hidden_dim]`, masking out padding positions.
    #[must_use]
    pub fn apply(&self, hidden_states: &ArrayView3<f32>, attention_mask: &[u32]) -> Vec<f32> {
        let seq_len = hidden_states.shape()[1];
        let hidden_dim = hidden_states.shape()[2];

        match self {
            Self::Cls => (0..hidden_dim).map(|d| hidden_states[[0, 0, d]]).collect(),
            Self::Mean => {
                #[allow(clippy::cast_precision_loss)]
                let valid: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                if valid == 0.0 {
                    return vec![0.0; hidden_dim];
                }

                let mut pooled = vec![0.0; hidden_dim];
                for (pos, &mask) in attention_mask.iter().enumerate() {
                    if mask != 0 {
                        for (d, value) in pooled.iter_mut().enumerate() {
                            *value += hidden_states[[0, pos, d]];
                        }
                    }
                }
                for value in &mut pooled {
                    *value /= valid;
                }
                pooled
            }
            Self::LastToken => {
                let last = attention_mask
                    .iter()
                    .rposition(|&m| m != 0)
                    .unwrap_or(seq_len - 1);
                (0..hidden_dim).map(|d| hidden_states[[0, last, d]]).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn hidden() -> Array3<f32> {
        // [1, 3, 4]: three tokens of four dims.
        Array3::from_shape_vec(
            (1, 3, 4),
            vec![
                1.0, 2.0, 3.0, 4.0, // token 0
                5.0, 6.0, 7.0, 8.0, // token 1
                9.0, 10.0, 11.0, 12.0, // token 2
            ],
        )
        .unwrap()
    }

    #[test]
    fn cls_takes_first_token() {
        let states = hidden();
        let result = PoolingStrategy::Cls.apply(&states.view(), &[1, 1, 1]);
        assert_eq!(result, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn mean_ignores_padding() {
        let states = hidden();
        let result = PoolingStrategy::Mean.apply(&states.view(), &[1, 1, 0]);
        assert_eq!(result, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn last_token_skips_padding() {
        let states = hidden();
        let result = PoolingStrategy::LastToken.apply(&states.view(), &[1, 1, 0]);
        assert_eq!(result, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn mean_of_all_zero_mask() {
        let states = hidden();
        let result = PoolingStrategy::Mean.apply(&states.view(), &[0, 0, 0]);
        assert_eq!(result, vec![0.0; 4]);
    }
}

//! Sliding-window context management for conversations.

use lodestone_core::{CharEstimator, TokenEstimator, Turn};

use crate::types::SearchResult;

/// Enforces a token budget over a conversation history.
///
/// When the history (plus any retrieved context counted toward the same
/// budget) exceeds the budget, older turns are dropped wholesale: a
/// leading system turn is always preserved, the most recent turns are
/// kept in full up to the budget, and everything older is discarded.
/// Turns are never truncated mid-content.
///
/// Token counts come from a [`TokenEstimator`]; the default assumes
/// four characters per token, and backends with a real tokenizer can
/// supply exact counts.
pub struct ContextWindow {
    max_tokens: usize,
    estimator: Box<dyn TokenEstimator>,
}

impl std::fmt::Debug for ContextWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextWindow")
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ContextWindow {
    /// Creates a window with the character-ratio estimator.
    #[must_use]
    pub fn new(max_tokens: usize) -> Self {
        Self::with_estimator(max_tokens, Box::new(CharEstimator::default()))
    }

    /// Creates a window with a custom token estimator.
    #[must_use]
    pub fn with_estimator(max_tokens: usize, estimator: Box<dyn TokenEstimator>) -> Self {
        Self {
            max_tokens,
            estimator,
        }
    }

    /// Returns the token budget.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Estimates the token count of a piece of text.
    #[must_use]
    pub fn estimate(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// Fits a conversation into the token budget.
    ///
    /// Retrieved chunk content is counted toward the same budget. The
    /// result is chronological with the system turn (if any) first, and
    /// the operation is idempotent: output that already fits is
    /// returned unchanged.
    ///
    /// A leading system turn is never dropped, even when it alone
    /// exceeds the budget.
    #[must_use]
    pub fn truncate(&self, turns: &[Turn], retrieved: &[SearchResult]) -> Vec<Turn> {
        if turns.is_empty() {
            return Vec::new();
        }

        let retrieved_tokens: usize = retrieved
            .iter()
            .map(|result| self.estimator.estimate(&result.chunk.text))
            .sum();
        let history_tokens: usize = turns
            .iter()
            .map(|turn| self.estimator.estimate(&turn.content))
            .sum();

        if retrieved_tokens + history_tokens <= self.max_tokens {
            return turns.to_vec();
        }

        let mut used = retrieved_tokens;
        let (system, rest) = match turns {
            [first, rest @ ..] if first.is_system() => {
                used += self.estimator.estimate(&first.content);
                (Some(first), rest)
            }
            _ => (None, turns),
        };

        // Walk from most recent to oldest; stop at the first turn that
        // would blow the budget and discard everything older.
        let mut kept: Vec<&Turn> = Vec::new();
        for turn in rest.iter().rev() {
            let cost = self.estimator.estimate(&turn.content);
            if used + cost > self.max_tokens {
                break;
            }
            used += cost;
            kept.push(turn);
        }

        let mut window = Vec::with_capacity(kept.len() + 1);
        if let Some(system) = system {
            window.push(system.clone());
        }
        window.extend(kept.into_iter().rev().cloned());
        window
    }
}

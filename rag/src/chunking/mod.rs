//! Text chunking strategies for the retrieval engine.
//!
//! This module provides the [`Chunker`] trait and the two strategies
//! the engine dispatches between:
//!
//! - [`SentenceChunker`]: groups prose sentences with a trailing-sentence
//!   overlap window
//! - [`CodeChunker`]: splits code at structural boundaries with a
//!   line-lookback overlap window
//!
//! [`ContentKind::detect`] classifies raw input so the engine can pick
//! the right strategy.

mod code;
mod sentence;

pub use code::CodeChunker;
pub use sentence::SentenceChunker;

use crate::error::Result;
use crate::types::{Chunk, Document};

/// Trait for text chunking strategies.
pub trait Chunker: Send + Sync {
    /// Splits a document into chunks.
    ///
    /// Empty input yields zero chunks. A single indivisible unit longer
    /// than the strategy's size bound becomes its own oversized chunk
    /// rather than being cut mid-content.
    fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>>;

    /// Returns the name of this chunking strategy.
    fn name(&self) -> &'static str;
}

/// Coarse classification of ingested content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Natural-language text, chunked by sentences.
    Prose,
    /// Source code, chunked at structural boundaries.
    Code,
}

/// Tokens whose presence marks a line as code-like.
const CODE_INDICATORS: [&str; 17] = [
    "def ", "class ", "import ", "from ", "function ", "{", "}", "var ", "let ", "const ",
    "public ", "private ", "#include", "int main", "void ", "struct ", "enum ",
];

impl ContentKind {
    /// Classifies text by scanning its first ten lines: more than 30%
    /// containing recognizable code tokens means [`Code`](Self::Code).
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().take(10).collect();
        if lines.is_empty() {
            return Self::Prose;
        }

        let code_lines = lines
            .iter()
            .filter(|line| CODE_INDICATORS.iter().any(|token| line.contains(token)))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = code_lines as f32 / lines.len() as f32;
        if ratio > 0.3 { Self::Code } else { Self::Prose }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_prose() {
        let text = "The quick brown fox jumps over the lazy dog.\nIt was a sunny day.";
        assert_eq!(ContentKind::detect(text), ContentKind::Prose);
    }

    #[test]
    fn detects_python() {
        let text = "import os\nimport sys\n\ndef main():\n    print('hi')\n";
        assert_eq!(ContentKind::detect(text), ContentKind::Code);
    }

    #[test]
    fn detects_c_like() {
        let text = "#include <stdio.h>\n\nint main() {\n    return 0;\n}\n";
        assert_eq!(ContentKind::detect(text), ContentKind::Code);
    }

    #[test]
    fn empty_input_is_prose() {
        assert_eq!(ContentKind::detect(""), ContentKind::Prose);
    }

    #[test]
    fn prose_mentioning_code_words() {
        // A single code-like line out of many stays under the 30% bar.
        let text = "One.\nTwo.\nThree.\nFour.\nimport this\nSix.\nSeven.\nEight.\nNine.\nTen.";
        assert_eq!(ContentKind::detect(text), ContentKind::Prose);
    }
}

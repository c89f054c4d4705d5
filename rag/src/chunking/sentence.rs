//! Sentence-based prose chunking with overlap.

use unicode_segmentation::UnicodeSegmentation;

use crate::dedup::content_hash;
use crate::error::Result;
use crate::types::{Chunk, Document};

use super::Chunker;

/// Chunks prose by sentence boundaries.
///
/// Sentences are accumulated greedily until appending the next one
/// would exceed the maximum chunk size; the buffer is then emitted and
/// the next buffer is seeded with the trailing overlap sentences, so
/// consecutive chunks share local context across the boundary.
///
/// # Example
///
/// ```rust
/// use lodestone_rag::chunking::{Chunker, SentenceChunker};
/// use lodestone_rag::Document;
///
/// let chunker = SentenceChunker::new(500, 2);
/// let doc = Document::new("doc1", "First sentence. Second sentence. Third sentence.");
/// let chunks = chunker.chunk(&doc).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    /// Maximum size of each chunk in characters.
    max_chunk_size: usize,
    /// Trailing sentences carried into the next chunk.
    overlap_sentences: usize,
}

impl SentenceChunker {
    /// Creates a new sentence chunker.
    ///
    /// # Arguments
    /// * `max_chunk_size` - Maximum characters per chunk
    /// * `overlap_sentences` - Trailing sentences shared with the next chunk
    #[must_use]
    pub const fn new(max_chunk_size: usize, overlap_sentences: usize) -> Self {
        Self {
            max_chunk_size,
            overlap_sentences,
        }
    }

    /// Creates a chunker with default settings (512 chars, 2 sentences).
    #[must_use]
    pub const fn default_settings() -> Self {
        Self::new(512, 2)
    }

    fn push_chunk(doc: &Document, chunks: &mut Vec<Chunk>, sentences: &[&str]) {
        let text = sentences.join(" ");
        let mut metadata = doc.metadata.clone();
        metadata.insert("sentence_count".into(), sentences.len().to_string());

        let index = chunks.len();
        chunks.push(Chunk::with_metadata(
            format!("{}#chunk_{}", doc.id, index),
            text.clone(),
            &doc.id,
            index,
            content_hash(&text),
            metadata,
        ));
    }

    fn joined_len(sentences: &[&str]) -> usize {
        if sentences.is_empty() {
            return 0;
        }
        let spaces = sentences.len() - 1;
        sentences.iter().map(|s| s.len()).sum::<usize>() + spaces
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::default_settings()
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let sentences: Vec<&str> = doc
            .text
            .unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();

        for sentence in sentences {
            let with_next = Self::joined_len(&buffer) + sentence.len() + usize::from(!buffer.is_empty());

            if !buffer.is_empty() && with_next > self.max_chunk_size {
                Self::push_chunk(doc, &mut chunks, &buffer);

                // Seed the next buffer with the trailing overlap window.
                let keep = self.overlap_sentences.min(buffer.len());
                buffer.drain(..buffer.len() - keep);
                buffer.push(sentence);

                // The overlap must not push a multi-sentence chunk past
                // the size bound; only a single oversized sentence may.
                while buffer.len() > 1 && Self::joined_len(&buffer) > self.max_chunk_size {
                    buffer.remove(0);
                }
            } else {
                buffer.push(sentence);
            }
        }

        if !buffer.is_empty() {
            Self::push_chunk(doc, &mut chunks, &buffer);
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunker = SentenceChunker::new(500, 2);
        let doc = Document::new("doc1", "Short sentence.");
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc1#chunk_0");
        assert_eq!(chunks[0].text, "Short sentence.");
        assert_eq!(
            chunks[0].metadata.get("sentence_count").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = SentenceChunker::default();
        assert!(chunker.chunk(&Document::new("doc1", "")).unwrap().is_empty());
        assert!(chunker.chunk(&Document::new("doc1", "   \n\t ")).unwrap().is_empty());
    }

    #[test]
    fn respects_size_bound() {
        let chunker = SentenceChunker::new(60, 2);
        let doc = Document::new(
            "doc1",
            "First sentence here. Second sentence here. Third sentence here. Fourth sentence here.",
        );
        let chunks = chunker.chunk(&doc).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.text.len() <= 60, "chunk {i} too long: {}", chunk.text.len());
            assert_eq!(chunk.source_id, "doc1");
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let chunker = SentenceChunker::new(80, 2);
        let doc = Document::new(
            "doc1",
            "Alpha is first. Beta follows alpha. Gamma follows beta. Delta follows gamma. \
             Epsilon follows delta. Zeta follows epsilon.",
        );
        let chunks = chunker.chunk(&doc).unwrap();
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            // The next chunk starts with sentences from the prior one.
            let prior_tail: Vec<&str> = pair[0].text.split(". ").collect();
            let shared = prior_tail
                .iter()
                .any(|sentence| !sentence.is_empty() && pair[1].text.contains(sentence.trim_end_matches('.')));
            assert!(shared, "no shared overlap between {:?} and {:?}", pair[0].text, pair[1].text);
        }
    }

    #[test]
    fn oversized_sentence_kept_whole() {
        let long = format!("This single sentence is far far too long {}.", "x".repeat(200));
        let chunker = SentenceChunker::new(64, 2);
        let doc = Document::new("doc1", format!("Short one. {long} Short two."));
        let chunks = chunker.chunk(&doc).unwrap();

        assert!(chunks.iter().any(|c| c.text.contains("far far too long")));
        // The oversized sentence is not cut mid-content.
        let oversized = chunks.iter().find(|c| c.text.len() > 64).unwrap();
        assert!(oversized.text.contains(&"x".repeat(200)));
    }

    #[test]
    fn coverage_no_content_dropped() {
        let doc = Document::new(
            "doc1",
            "One little sentence. Two little sentences. Three little sentences. \
             Four little sentences. Five little sentences.",
        );
        let chunker = SentenceChunker::new(50, 1);
        let chunks = chunker.chunk(&doc).unwrap();

        // Every source sentence appears in at least one chunk.
        for sentence in [
            "One little sentence.",
            "Two little sentences.",
            "Three little sentences.",
            "Four little sentences.",
            "Five little sentences.",
        ] {
            assert!(
                chunks.iter().any(|c| c.text.contains(sentence)),
                "missing sentence: {sentence}"
            );
        }
    }

    #[test]
    fn two_thousand_char_document() {
        // ~2000 chars of ~50-char sentences with chunk size 512 should
        // land in the 4-6 chunk range, each within the bound.
        let sentence = "The retrieval engine indexes documents by meaning. ";
        let text = sentence.repeat(40);
        let chunker = SentenceChunker::new(512, 2);
        let chunks = chunker.chunk(&Document::new("doc1", text)).unwrap();

        assert!((4..=6).contains(&chunks.len()), "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(chunk.text.len() <= 512);
        }
    }

    #[test]
    fn deterministic() {
        let doc = Document::new("doc1", "Alpha one. Beta two. Gamma three. Delta four.");
        let chunker = SentenceChunker::new(30, 1);
        let a = chunker.chunk(&doc).unwrap();
        let b = chunker.chunk(&doc).unwrap();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.content_hash, y.content_hash);
        }
    }
}

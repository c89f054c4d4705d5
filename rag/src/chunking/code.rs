//! Structural-boundary code chunking.

use crate::dedup::content_hash;
use crate::error::Result;
use crate::types::{Chunk, Document};

use super::Chunker;

/// Line openers that start a new logical unit across common syntaxes.
const UNIT_OPENERS: [&str; 7] = [
    "def ", "class ", "function ", "fn ", "public ", "private ", "protected ",
];

/// Control-structure keywords, significant when followed by `(`.
const CONTROL_KEYWORDS: [&str; 4] = ["if", "for", "while", "switch"];

/// Chunks source code at structural boundaries.
///
/// The input is scanned line by line; lines opening a function, class,
/// control structure, or comment block become split points. Each chunk
/// records its source line range and the detected language, and is
/// seeded with a lookback window of preceding lines so definitions keep
/// their surrounding context.
#[derive(Debug, Clone)]
pub struct CodeChunker {
    /// Lines of lookback context carried into the next chunk.
    overlap_lines: usize,
}

impl CodeChunker {
    /// Creates a new code chunker.
    ///
    /// # Arguments
    /// * `overlap_lines` - Preceding lines carried into the next chunk
    #[must_use]
    pub const fn new(overlap_lines: usize) -> Self {
        Self { overlap_lines }
    }

    /// Creates a chunker with default settings (64-line lookback).
    #[must_use]
    pub const fn default_settings() -> Self {
        Self::new(64)
    }

    /// Returns `true` when a line starts a new logical unit.
    fn is_boundary(line: &str) -> bool {
        let trimmed = line.trim_start();

        if UNIT_OPENERS.iter().any(|kw| trimmed.starts_with(kw)) {
            return true;
        }

        for kw in CONTROL_KEYWORDS {
            if let Some(rest) = trimmed.strip_prefix(kw) {
                if rest.trim_start().starts_with('(') {
                    return true;
                }
            }
        }

        trimmed.starts_with("# ")
    }

    fn push_chunk(
        doc: &Document,
        chunks: &mut Vec<Chunk>,
        lines: &[&str],
        start_line: usize,
        end_line: usize,
        language: &str,
    ) {
        let text = lines.join("\n");
        if text.trim().is_empty() {
            return;
        }

        let mut metadata = doc.metadata.clone();
        metadata.insert("start_line".into(), start_line.to_string());
        metadata.insert("end_line".into(), end_line.to_string());
        metadata.insert("language".into(), language.to_string());

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
}

impl Default for CodeChunker {
    fn default() -> Self {
        Self::default_settings()
    }
}

impl Chunker for CodeChunker {
    fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let lines: Vec<&str> = doc.text.lines().collect();
        if lines.is_empty() || doc.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let language = detect_language(&doc.text);
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut chunk_start_line = 0usize;

        for (i, line) in lines.iter().enumerate() {
            if Self::is_boundary(line) && !current.is_empty() {
                Self::push_chunk(doc, &mut chunks, &current, chunk_start_line, i - 1, language);

                if self.overlap_lines > 0 {
                    let overlap_start = i.saturating_sub(self.overlap_lines);
                    current = lines[overlap_start..=i].to_vec();
                    chunk_start_line = overlap_start;
                } else {
                    current = vec![line];
                    chunk_start_line = i;
                }
            } else {
                current.push(line);
            }
        }

        if !current.is_empty() {
            Self::push_chunk(
                doc,
                &mut chunks,
                &current,
                chunk_start_line,
                lines.len() - 1,
                language,
            );
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "code_boundary"
    }
}

/// Guesses the source language from the first ten lines.
fn detect_language(code: &str) -> &'static str {
    let head = code
        .lines()
        .take(10)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    if head.contains("import torch") || head.contains("import tensorflow") {
        "python_ml"
    } else if head.contains("def ") && head.contains("import ") {
        "python"
    } else if head.contains("function ") || head.contains("const ") {
        "javascript"
    } else if head.contains("public class") || head.contains("private void") {
        "java"
    } else if head.contains("#include") {
        "cpp"
    } else if head.contains("func ") {
        "go"
    } else if head.contains("fn ") && head.contains("->") {
        "rust"
    } else {
        "unknown"
    }
}

//! Content hashing for chunk identity and derived document ids.

use xxhash_rust::xxh3::xxh3_64;

/// Computes a content hash used for chunk staleness detection and
/// deduplication.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Derives a stable document id from content.
///
/// Used when the caller does not supply an id at ingestion time;
/// identical content always maps to the same id.
#[must_use]
pub fn derived_document_id(text: &str) -> String {
    format!("doc-{:016x}", xxh3_64(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_hash() {
        let text = "Hello, world!";
        assert_eq!(content_hash(text), content_hash(text));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(content_hash("Hello, world!"), content_hash("Goodbye, world!"));
    }

    #[test]
    fn derived_ids_are_stable() {
        let a = derived_document_id("Some document body.");
        let b = derived_document_id("Some document body.");
        assert_eq!(a, b);
        assert!(a.starts_with("doc-"));
        assert_eq!(a.len(), "doc-".len() + 16);
    }
}

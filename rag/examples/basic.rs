//! Basic ingest-and-retrieve flow on the fallback encoder.

use lodestone_rag::{DigestEmbedder, RetrievalEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let engine = RetrievalEngine::builder(None::<DigestEmbedder>)
        .index_path("./demo_index.bin")
        .build();

    let docs = [
        ("rag-basics", "Retrieval-augmented generation grounds model answers in stored text."),
        ("chunking", "Chunking splits large documents into overlapping passages for indexing."),
        ("rust", "Rust focuses on performance and safety through ownership and borrowing."),
    ];

    for (id, text) in docs {
        let receipt = engine.ingest(text, Some(id.to_string()), None).await?;
        println!(
            "ingested {} ({} chunks, degraded: {})",
            receipt.document_id, receipt.chunk_count, receipt.degraded
        );
    }

    for hit in engine.retrieve("how do I prepare documents for indexing?").await? {
        println!("{:.3}  [{}] {}", hit.score, hit.document_id(), hit.chunk.text);
    }

    if let Some(summary) = engine.document_summary("chunking") {
        println!(
            "summary: {} chars, {} chunk(s), ingested at {}",
            summary.length, summary.chunk_count, summary.ingested_at
        );
    }

    engine.save()?;
    Ok(())
}

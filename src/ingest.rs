//! Plain-text book ingestion.
//!
//! A book is split into whitespace-aligned chunks and each chunk is stored as
//! a `kind = "book"` record carrying enough metadata (`book_id`, `filename`,
//! `chunk_index`, `source_format`) to reassemble or bulk-manage it later.
//! Chunks share the regular record id space and rank in retrieval like any
//! other memory.

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::constants::{BOOK_ID_HEX_LEN, DEFAULT_BOOK_CHUNK_CHARS};
use crate::engine::MemoryEngine;
use crate::errors::{MemoryError, Result};
use crate::types::{Metadata, RecordId, KIND_BOOK, META_TYPE};

pub const META_BOOK_ID: &str = "book_id";
pub const META_FILENAME: &str = "filename";
pub const META_CHUNK_INDEX: &str = "chunk_index";
pub const META_SOURCE_FORMAT: &str = "source_format";

/// What one ingestion run produced.
#[derive(Debug, Clone)]
pub struct BookSummary {
    pub book_id: String,
    pub filename: String,
    pub chunk_count: usize,
    pub record_ids: Vec<RecordId>,
}

/// Stable identifier for a text: the leading hex of its SHA-256 digest.
/// The same content always maps to the same id, whatever the filename.
pub fn book_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")[..BOOK_ID_HEX_LEN].to_string()
}

/// Splits `text` into chunks of at most `max_chars`, never breaking inside a
/// word. A single token longer than the budget becomes its own oversized
/// chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Chunks `text` and stores every chunk through the engine. Errors on blank
/// input; otherwise returns the book id and the stored record ids in chunk
/// order.
pub async fn ingest_text(
    engine: &MemoryEngine,
    filename: &str,
    source_format: &str,
    text: &str,
) -> Result<BookSummary> {
    if text.trim().is_empty() {
        return Err(MemoryError::InvalidInput {
            field: "text".to_string(),
            reason: "book text must not be empty".to_string(),
        });
    }

    let book_id = book_id(text);
    let chunks = chunk_text(text, DEFAULT_BOOK_CHUNK_CHARS);

    let mut record_ids = Vec::with_capacity(chunks.len());
    for (chunk_index, chunk) in chunks.into_iter().enumerate() {
        let mut metadata = Metadata::new();
        metadata.insert(META_TYPE.to_string(), json!(KIND_BOOK));
        metadata.insert(META_BOOK_ID.to_string(), json!(book_id));
        metadata.insert(META_FILENAME.to_string(), json!(filename));
        metadata.insert(META_CHUNK_INDEX.to_string(), json!(chunk_index));
        metadata.insert(META_SOURCE_FORMAT.to_string(), json!(source_format));

        record_ids.push(engine.remember(chunk, metadata).await?);
    }

    let summary = BookSummary {
        book_id,
        filename: filename.to_string(),
        chunk_count: record_ids.len(),
        record_ids,
    };
    info!(
        book_id = %summary.book_id,
        file = %summary.filename,
        chunks = summary.chunk_count,
        "📚 book ingested"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    fn fallback_engine() -> (MemoryEngine, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let engine = MemoryEngine::new(
            EngineConfig {
                data_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
            None,
        );
        (engine, dir)
    }

    #[test]
    fn test_book_id_is_stable_and_short() {
        let a = book_id("some book text");
        let b = book_id("some book text");
        let c = book_id("other book text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), BOOK_ID_HEX_LEN);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_chunks_respect_budget_and_word_boundaries() {
        let text = "alpha beta gamma delta epsilon zeta eta theta".repeat(4);
        let chunks = chunk_text(&text, 20);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 20, "chunk over budget: {chunk:?}");
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }

        // Rejoining the chunks yields the whitespace-normalized text.
        let expected: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunks.join(" "), expected.join(" "));
    }

    #[test]
    fn test_oversized_word_becomes_its_own_chunk() {
        let long_word = "x".repeat(50);
        let text = format!("short {long_word} tail");
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks, vec!["short".to_string(), long_word, "tail".to_string()]);
    }

    #[test]
    fn test_blank_text_yields_no_chunks() {
        assert!(chunk_text("   \n\t  ", 100).is_empty());
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_text() {
        let (engine, _dir) = fallback_engine();
        let err = ingest_text(&engine, "empty.txt", "txt", "  \n ")
            .await
            .expect_err("blank book");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_ingest_stores_chunks_with_book_metadata() {
        let (engine, _dir) = fallback_engine();
        let text = "one two three four five six seven eight nine ten".repeat(3);

        let summary = ingest_text(&engine, "numbers.txt", "txt", &text)
            .await
            .expect("ingest");
        assert_eq!(summary.chunk_count, summary.record_ids.len());
        assert!(summary.chunk_count > 0);

        for (chunk_index, id) in summary.record_ids.iter().enumerate() {
            let record = engine.get(id).await.expect("chunk stored");
            assert_eq!(record.kind, KIND_BOOK);
            assert_eq!(record.metadata[META_BOOK_ID], json!(summary.book_id));
            assert_eq!(record.metadata[META_FILENAME], json!("numbers.txt"));
            assert_eq!(record.metadata[META_CHUNK_INDEX], json!(chunk_index));
            assert_eq!(record.metadata[META_SOURCE_FORMAT], json!("txt"));
        }

        let stats = engine.stats().await.expect("stats");
        assert_eq!(stats.total_items, summary.chunk_count);
        assert_eq!(stats.interaction_count, 0);
    }

    #[tokio::test]
    async fn test_ingested_chunks_surface_in_retrieval() {
        let (engine, _dir) = fallback_engine();
        ingest_text(
            &engine,
            "geography.txt",
            "txt",
            "The capital of France is Paris and it sits on the Seine",
        )
        .await
        .expect("ingest");

        let results = engine.retrieve("capital france", 3).await.expect("search");
        assert!(!results.is_empty());
        assert!(results[0].record.content.contains("Paris"));
    }
}

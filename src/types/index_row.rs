//! The row shape the indexer inserts into the vector row store (§3).

use serde::{Deserialize, Serialize};

use super::chunk::{Chunk, SemanticRegion, TokenRange};

/// One row per chunk, inserted exactly once (`chunk_id` is the primary key;
/// conflict-on-insert is a silent skip — §4.3 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRow {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub meta: serde_json::Value,
    pub token_count: usize,
    pub token_range: TokenRange,
    pub document_total_tokens: usize,
    pub semantic_region: SemanticRegion,
    pub source_url: Option<String>,
    pub page_number: Option<u32>,
    pub language: Option<String>,
    pub ingest_time: String,
    pub parser_version: String,
}

impl IndexRow {
    /// Build a row from a materialized chunk and its embedding, folding the
    /// enriched fields that aren't first-class VRS columns into `meta`
    /// (§4.3 step 2).
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        let meta = serde_json::json!({
            "headings": chunk.headings,
            "heading_path": chunk.heading_path,
            "layout_tags": chunk.layout_tags,
            "figures": chunk.figures,
            "used_ocr": chunk.used_ocr,
            "trust_level": chunk.trust_level,
            "topic_tags": chunk.topic_tags,
            "region": chunk.region,
            "source_domain": chunk.source_domain,
            "last_updated": chunk.last_updated,
            "provenance": {
                "raw_sha256": chunk.provenance.raw_sha256,
                "raw_key": chunk.provenance.raw_key,
                "original_url": chunk.provenance.original_url,
            },
        });

        Self {
            chunk_id: chunk.chunk_id.clone(),
            document_id: chunk.document_id.clone(),
            content: chunk.text.clone(),
            embedding,
            meta,
            token_count: chunk.token_count,
            token_range: chunk.token_range,
            document_total_tokens: chunk.document_total_tokens,
            semantic_region: chunk.semantic_region,
            source_url: chunk.source_url.clone(),
            page_number: chunk.page_number,
            language: chunk.language.clone(),
            ingest_time: chunk.ingest_time.clone(),
            parser_version: chunk.parser_version.clone(),
        }
    }
}

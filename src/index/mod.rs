//! Indexer (IDX): streams chunk JSONL, validates, embeds, and inserts into
//! the vector row store exactly once per chunk (§4.3).

use crate::clients::Embedder;
use crate::error::IndexError;
use crate::store::{ObjectStore, VectorRowStore};
use crate::types::chunk::Chunk;
use crate::types::IndexRow;

/// Distinct outcomes the indexing binary maps to process exit codes
/// (§4.3 "Failure semantics", §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerOutcome {
    Ok { inserted: u64, skipped_existing: u64 },
    SchemaSkips { count: u64 },
}

/// Required keys for a chunk JSONL line to be schema-valid (§4.3 step 1).
/// `ingest_time` is accepted in place of the historical `timestamp` key.
const REQUIRED_KEYS: &[&str] = &[
    "document_id",
    "chunk_id",
    "text",
    "chunk_index",
    "token_count",
    "token_range",
    "document_total_tokens",
    "parser_version",
];

/// Schema-validate one already-deserialized chunk line against the raw
/// JSON value it came from, so a line missing a required key is rejected
/// even if `serde`'s `#[serde(default)]` would otherwise paper over it.
pub fn schema_validate(raw: &serde_json::Value) -> Result<(), String> {
    let obj = raw.as_object().ok_or_else(|| "line is not a JSON object".to_string())?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(*key) {
            return Err(format!("missing required key: {key}"));
        }
    }
    if !obj.contains_key("ingest_time") && !obj.contains_key("timestamp") {
        return Err("missing ingest_time/timestamp".to_string());
    }
    Ok(())
}

/// Stream one document's chunk JSONL out of `object_store`, schema-validate
/// each line, skip rows already present by PK, embed the rest, validate
/// dimension, and batch-insert (§4.3 steps 1, 3-5).
///
/// A line that fails to parse, fails [`schema_validate`], or fails to
/// deserialize into a [`Chunk`] is counted as a schema skip and the line is
/// dropped rather than aborting the whole file — mirroring
/// `original_source/embed_and_index.py`'s per-line `continue` on a bad
/// record. A non-zero skip count still surfaces as a distinct
/// [`IndexerOutcome::SchemaSkips`] once the rest of the file has been
/// indexed, rather than silently swallowing the defect.
pub async fn index_chunks(
    vrs: &dyn VectorRowStore,
    embedder: &dyn Embedder,
    object_store: &dyn ObjectStore,
    chunk_file_key: &str,
    embed_dim: usize,
    batch_size: usize,
) -> Result<IndexerOutcome, IndexError> {
    let bytes = object_store
        .get(chunk_file_key)
        .await?
        .ok_or_else(|| IndexError::ChunkFileMissing(chunk_file_key.to_string()))?;
    let text = String::from_utf8_lossy(&bytes);

    let mut batch = Vec::with_capacity(batch_size);
    let mut inserted = 0u64;
    let mut skipped_existing = 0u64;
    let mut schema_skips = 0u64;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let raw: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable chunk line");
                schema_skips += 1;
                continue;
            }
        };
        if let Err(reason) = schema_validate(&raw) {
            tracing::warn!(%reason, "skipping schema-invalid chunk line");
            schema_skips += 1;
            continue;
        }
        let chunk: Chunk = match serde_json::from_value(raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "skipping chunk line that failed to deserialize");
                schema_skips += 1;
                continue;
            }
        };

        if vrs.exists(&chunk.chunk_id).await? {
            skipped_existing += 1;
            continue;
        }

        let embedding = embedder.embed(chunk.text.trim()).await?;
        if embedding.len() != embed_dim {
            return Err(IndexError::DimensionMismatch { expected: embed_dim, actual: embedding.len() });
        }

        batch.push(IndexRow::from_chunk(&chunk, embedding));
        if batch.len() >= batch_size {
            inserted += vrs.insert_batch(&batch).await?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        inserted += vrs.insert_batch(&batch).await?;
    }

    if schema_skips > 0 {
        return Ok(IndexerOutcome::SchemaSkips { count: schema_skips });
    }
    Ok(IndexerOutcome::Ok { inserted, skipped_existing })
}

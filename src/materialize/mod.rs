//! Materializer (MAT): atomic, idempotent persistence of a document's
//! chunk set plus its raw-manifest update (§4.2).

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::MaterializeError;
use crate::store::ObjectStore;
use crate::types::chunk::Chunk;
use crate::types::raw::{ChunkedMeta, RawManifest};

/// Outcome of one materialize call, distinguishing an idempotency hit from
/// an actual write (§4.2 step 2, §8 "Round-trip / idempotence laws").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    IdempotencyHit,
    Written { chunk_count: u64, chunked_sha256: String },
}

/// Canonically serialize chunks as JSONL (one object per line, trailing
/// newline) — `serde`'s struct field order is already stable across runs,
/// so no key-sorting machinery is needed to satisfy the determinism
/// contract (§4.2 step 1, §9 component design note).
pub fn serialize_chunks_jsonl(chunks: &[Chunk]) -> Result<Vec<u8>, MaterializeError> {
    let mut out = Vec::new();
    for chunk in chunks {
        let line = serde_json::to_string(chunk).map_err(MaterializeError::Chunk)?;
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    Ok(out)
}

/// Deterministic object-store key for a document's chunk JSONL file, shared
/// by the materializer (which writes it) and the indexer (which streams it
/// back) so neither has to guess the other's layout.
pub fn chunk_file_key(chunked_prefix: &str, schema_version: &str, document_id: &str) -> String {
    format!("{chunked_prefix}/{schema_version}/{document_id}.chunks.jsonl")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write `chunks` for document `document_id` under `chunked_prefix`,
/// merging the `chunked` sub-object into the manifest at `raw_key`'s
/// sibling `.manifest.json` (§4.2 steps 1-5).
///
/// Chunk-file write happens strictly before the manifest write (§5b
/// ordering guarantee) — enforced by statement order below, not a lock.
pub async fn materialize(
    store: &dyn ObjectStore,
    document_id: &str,
    raw_key: &str,
    chunks: &[Chunk],
    chunked_prefix: &str,
    schema_version: &str,
    parser_version: &str,
) -> Result<MaterializeOutcome, MaterializeError> {
    let jsonl = serialize_chunks_jsonl(chunks)?;
    let sha256 = sha256_hex(&jsonl);
    let size_bytes = jsonl.len() as u64;

    let manifest_key = format!("{raw_key}.manifest.json");
    let mut manifest = load_manifest(store, &manifest_key).await?;

    if let Some(existing) = manifest.as_ref().and_then(|m| m.chunked.as_ref()) {
        if existing.chunked_sha256 == sha256 {
            return Ok(MaterializeOutcome::IdempotencyHit);
        }
    }

    let chunk_file_key = chunk_file_key(chunked_prefix, schema_version, document_id);
    store
        .put_atomic(&chunk_file_key, &jsonl)
        .await
        .map_err(MaterializeError::Store)?;

    let ingest_time = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let chunked_meta = ChunkedMeta {
        chunk_file: chunk_file_key,
        chunk_format: "jsonl".to_string(),
        schema_version: schema_version.to_string(),
        parser_version: parser_version.to_string(),
        ingest_time: ingest_time.clone(),
        chunk_count: chunks.len() as u64,
        chunked_sha256: sha256.clone(),
        chunked_size_bytes: size_bytes,
    };

    let manifest = manifest.get_or_insert_with(|| RawManifest {
        file_hash: String::new(),
        timestamp: ingest_time.clone(),
        original_url: None,
        tags: Vec::new(),
        trust_level: crate::types::raw::default_trust_level(),
        last_updated: None,
        language: None,
        chunked: None,
        saved_chunks: None,
        chunked_manifest_written_at: None,
    });
    manifest.chunked = Some(chunked_meta);
    manifest.saved_chunks = Some(chunks.len() as u64);
    manifest.chunked_manifest_written_at = Some(ingest_time);

    let manifest_bytes = serde_json::to_vec(manifest).map_err(MaterializeError::Manifest)?;
    store
        .put_atomic(&manifest_key, &manifest_bytes)
        .await
        .map_err(MaterializeError::Store)?;

    Ok(MaterializeOutcome::Written { chunk_count: chunks.len() as u64, chunked_sha256: sha256 })
}

async fn load_manifest(
    store: &dyn ObjectStore,
    manifest_key: &str,
) -> Result<Option<RawManifest>, MaterializeError> {
    match store.get(manifest_key).await.map_err(MaterializeError::Store)? {
        Some(bytes) => {
            let manifest: RawManifest =
                serde_json::from_slice(&bytes).map_err(MaterializeError::Manifest)?;
            Ok(Some(manifest))
        }
        None => Ok(None),
    }
}

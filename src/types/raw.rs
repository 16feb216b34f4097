//! Raw source objects and their manifests (§3, §6.1, §6.4).

use serde::{Deserialize, Serialize};

/// A content-addressed blob produced by the (out-of-scope) crawler.
///
/// Read-only to the core: nothing in this crate ever mutates a `RawObject`.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub sha256: String,
}

/// One manifest per [`RawObject`], extended in place with a [`ChunkedMeta`]
/// once chunking succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawManifest {
    pub file_hash: String,
    pub timestamp: String,
    pub original_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_trust_level")]
    pub trust_level: String,
    pub last_updated: Option<String>,
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunked: Option<ChunkedMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_chunks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunked_manifest_written_at: Option<String>,
}

pub fn default_trust_level() -> String {
    "gov".to_string()
}

/// Embedded in [`RawManifest`] once a document has been chunked; updated
/// only when the freshly computed sha256 differs from the stored one
/// (§4.2 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkedMeta {
    pub chunk_file: String,
    #[serde(default = "chunk_format_jsonl")]
    pub chunk_format: String,
    pub schema_version: String,
    pub parser_version: String,
    pub ingest_time: String,
    pub chunk_count: u64,
    pub chunked_sha256: String,
    pub chunked_size_bytes: u64,
}

fn chunk_format_jsonl() -> String {
    "jsonl".to_string()
}

/// Content-addressed chunk-file metadata kept alongside the manifest update.
///
/// Identical chunk sets produce identical `sha256` (§3 invariant 3).
#[derive(Debug, Clone)]
pub struct ChunkFile {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub chunk_count: u64,
}

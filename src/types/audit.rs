//! One best-effort record per request (§3, §4.6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub session_id: Option<String>,
    pub language: String,
    pub channel: String,
    pub query: String,
    pub used_chunk_ids: Vec<String>,
    pub top_similarity: f32,
    pub resolution: String,
    pub generator_decision: Option<String>,
    pub timing_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_key: Option<String>,
}

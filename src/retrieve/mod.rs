//! Retriever (RET): embed a query, run filter-first k-NN against the
//! vector row store, dedupe, re-rank, and return top-K passages (§4.4).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::clients::Embedder;
use crate::error::RetrieveError;
use crate::store::VectorRowStore;

/// A retrieved chunk surfaced to the generator and, hydrated as a
/// citation, to the client — addressed by its 1-based `number` (§4.4 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub number: u32,
    pub chunk_id: String,
    pub text: String,
    pub source_url: Option<String>,
    pub meta: serde_json::Value,
    pub score: f32,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct RetrieveOutcome {
    pub passages: Vec<Passage>,
    pub top_similarity: f32,
}

/// Re-rank and dedupe knobs, sourced from [`crate::config::Config`].
pub struct RetrieverConfig {
    pub raw_k: usize,
    pub final_k: usize,
    pub embed_dim: usize,
    /// Restores the original's third re-rank factor (linear decay over this
    /// many days); disabled by default to keep the documented
    /// `final_score = similarity x trust_weight` behavior (SPEC_FULL §4.4).
    pub freshness_days: Option<u32>,
}

/// `meta.trust_level` -> weight table (§4.4 step 4).
fn trust_weight(trust_level: Option<&str>) -> f32 {
    match trust_level {
        Some("gov") | Some("government") => 1.0,
        Some("implementing_agency") | Some("agency") => 0.92,
        Some("ngo") => 0.75,
        Some("news") => 0.6,
        _ => 1.0,
    }
}

/// Linear decay to zero over `freshness_days`; `last_updated` missing or
/// unparsable contributes full weight (no penalty for unknown age).
fn freshness_weight(last_updated: Option<&str>, freshness_days: u32, now: DateTime<Utc>) -> f32 {
    let Some(raw) = last_updated else { return 1.0 };
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else { return 1.0 };
    let age_days = (now - parsed.with_timezone(&Utc)).num_days().max(0) as f32;
    (1.0 - age_days / freshness_days as f32).clamp(0.0, 1.0)
}

fn normalized_text_hash(text: &str) -> String {
    let collapsed: String = text
        .nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(collapsed.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate and sort filter keys, embed the query, fetch candidates, dedupe
/// by normalized text, re-rank, and return the top `final_k` passages
/// (§4.4 steps 1-5).
pub async fn retrieve(
    embedder: &dyn Embedder,
    vrs: &dyn VectorRowStore,
    query: &str,
    filters: &BTreeMap<String, String>,
    config: &RetrieverConfig,
) -> Result<RetrieveOutcome, RetrieveError> {
    let query_embedding = embedder.embed(query).await?;
    if query_embedding.len() != config.embed_dim {
        return Err(RetrieveError::Embedder(crate::error::EmbedderError::DimensionMismatch {
            expected: config.embed_dim,
            actual: query_embedding.len(),
        }));
    }

    let candidates = vrs.search(&query_embedding, config.raw_k, filters).await?;

    let mut seen = std::collections::HashSet::new();
    let now = Utc::now();
    let mut scored: Vec<(f32, f32, String, crate::store::Candidate)> = Vec::new();

    for candidate in candidates {
        let hash = normalized_text_hash(&candidate.row.content);
        if !seen.insert(hash) {
            continue;
        }

        let similarity = 1.0 / (1.0 + candidate.distance);
        let trust = trust_weight(candidate.row.meta.get("trust_level").and_then(|v| v.as_str()));
        let mut final_score = similarity * trust;

        if let Some(days) = config.freshness_days {
            let last_updated = candidate.row.meta.get("last_updated").and_then(|v| v.as_str());
            final_score *= freshness_weight(last_updated, days, now);
        }

        let chunk_id = candidate.row.chunk_id.clone();
        scored.push((final_score, similarity, chunk_id, candidate));
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap()
            .then_with(|| b.1.partial_cmp(&a.1).unwrap())
            .then_with(|| a.2.cmp(&b.2))
    });

    let passages: Vec<Passage> = scored
        .into_iter()
        .take(config.final_k)
        .enumerate()
        .map(|(i, (final_score, _similarity, _chunk_id, candidate))| Passage {
            number: (i + 1) as u32,
            chunk_id: candidate.row.chunk_id,
            text: candidate.row.content,
            source_url: candidate.row.source_url,
            meta: candidate.row.meta,
            score: final_score,
            distance: candidate.distance,
        })
        .collect();

    let top_similarity = passages.first().map(|p| p.score).unwrap_or(0.0);

    Ok(RetrieveOutcome { passages, top_similarity })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_weight_table() {
        assert_eq!(trust_weight(Some("gov")), 1.0);
        assert_eq!(trust_weight(Some("news")), 0.6);
        assert_eq!(trust_weight(None), 1.0);
    }

    #[test]
    fn normalized_hash_is_case_and_space_insensitive() {
        assert_eq!(normalized_text_hash("Hello  World"), normalized_text_hash("hello world"));
        assert_ne!(normalized_text_hash("hello world"), normalized_text_hash("goodbye world"));
    }

    #[test]
    fn freshness_weight_decays_linearly() {
        let now = Utc::now();
        let recent = now.to_rfc3339();
        assert_eq!(freshness_weight(Some(&recent), 365, now), 1.0);
        assert_eq!(freshness_weight(None, 365, now), 1.0);
    }
}

//! Vector Row Store (VRS): relational row store with a typed fixed-dimension
//! vector column and an HNSW index (§2, §4.3, §4.4).

pub mod pg;
pub mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::types::IndexRow;

/// A candidate row returned by [`VectorRowStore::search`], paired with its
/// raw distance (smaller is closer — §9 "distance/similarity convention").
#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: IndexRow,
    pub distance: f32,
}

/// Filter keys must match this pattern or they are dropped with a warning
/// (§4.4 step 2).
pub fn is_valid_filter_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Collaborator abstraction over the vector-capable relational store. Both
/// the indexer (writes) and the retriever (reads) share one handle, per the
/// `Core` struct design note (§9, §5).
#[async_trait]
pub trait VectorRowStore: Send + Sync {
    /// Create the backing table/index if absent. Idempotent.
    async fn ensure_schema(&self, embed_dim: usize) -> Result<(), VectorStoreError>;

    /// Primary-key existence check (§4.3 step 3).
    async fn exists(&self, chunk_id: &str) -> Result<bool, VectorStoreError>;

    /// Insert rows with `ON CONFLICT (chunk_id) DO NOTHING`; returns the
    /// number of rows actually inserted (§4.3 step 5).
    async fn insert_batch(&self, rows: &[IndexRow]) -> Result<u64, VectorStoreError>;

    /// Filter-first k-NN candidate fetch, ordered by ascending distance
    /// (§4.4 step 2). `filters` have already been validated and sorted by
    /// the retriever before this call.
    async fn search(
        &self,
        query_embedding: &[f32],
        raw_k: usize,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<Candidate>, VectorStoreError>;

    /// Verify the table and its HNSW index exist; missing index logs a WARN
    /// without failing (§4.4 "Startup sanity").
    async fn startup_sanity_check(&self) -> Result<(), VectorStoreError>;
}

/// Serialize a query vector as a textual literal with 17 significant
/// digits, matching the precision the original SQL query binds (§4.4 step 2).
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding
        .iter()
        .map(|v| format!("{v:.17e}"))
        .collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_key_validation() {
        assert!(is_valid_filter_key("region"));
        assert!(is_valid_filter_key("topic_tag_1"));
        assert!(!is_valid_filter_key("bad key"));
        assert!(!is_valid_filter_key("drop;table"));
        assert!(!is_valid_filter_key(""));
    }

    #[test]
    fn vector_literal_is_bracketed_csv() {
        let lit = vector_literal(&[1.0, -2.5]);
        assert!(lit.starts_with('['));
        assert!(lit.ends_with(']'));
        assert_eq!(lit.matches(',').count(), 1);
    }
}

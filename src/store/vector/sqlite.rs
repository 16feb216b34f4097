//! SQLite-backed counterpart to [`super::pg::PgVectorRowStore`] for local
//! development and tests, where a real Postgres + pgvector instance isn't
//! available. SQLite has no vector type or distance operator, so the
//! embedding is stored as a JSON array of f32 and distance is computed in
//! Rust after a full table scan — acceptable for dev/test corpora, not
//! meant to scale (§9 "VRS backend" open question).

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::Row;

use super::{Candidate, VectorRowStore, is_valid_filter_key};
use crate::error::VectorStoreError;
use crate::types::chunk::{SemanticRegion, TokenRange};
use crate::types::IndexRow;

pub struct SqliteVectorRowStore {
    pool: SqlitePool,
}

impl SqliteVectorRowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl VectorRowStore for SqliteVectorRowStore {
    async fn ensure_schema(&self, _embed_dim: usize) -> Result<(), VectorStoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding TEXT NOT NULL,
                meta TEXT NOT NULL DEFAULT '{}',
                token_count INTEGER NOT NULL,
                token_start INTEGER NOT NULL,
                token_end INTEGER NOT NULL,
                document_total_tokens INTEGER NOT NULL,
                semantic_region TEXT NOT NULL,
                source_url TEXT,
                page_number INTEGER,
                language TEXT,
                ingest_time TEXT NOT NULL,
                parser_version TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, chunk_id: &str) -> Result<bool, VectorStoreError> {
        let row = sqlx::query("SELECT 1 FROM chunks WHERE chunk_id = ?1")
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_batch(&self, rows: &[IndexRow]) -> Result<u64, VectorStoreError> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let embedding_json = serde_json::to_string(&row.embedding).unwrap_or_default();
            let meta_json = row.meta.to_string();
            let result = sqlx::query(
                "INSERT OR IGNORE INTO chunks
                    (chunk_id, document_id, content, embedding, meta, token_count,
                     token_start, token_end, document_total_tokens, semantic_region,
                     source_url, page_number, language, ingest_time, parser_version)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            )
            .bind(&row.chunk_id)
            .bind(&row.document_id)
            .bind(&row.content)
            .bind(embedding_json)
            .bind(meta_json)
            .bind(row.token_count as i64)
            .bind(row.token_range.start as i64)
            .bind(row.token_range.end as i64)
            .bind(row.document_total_tokens as i64)
            .bind(region_label(row.semantic_region))
            .bind(&row.source_url)
            .bind(row.page_number.map(|p| p as i64))
            .bind(&row.language)
            .bind(&row.ingest_time)
            .bind(&row.parser_version)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        raw_k: usize,
        filters: &BTreeMap<String, String>,
    ) -> Result<Vec<Candidate>, VectorStoreError> {
        let valid_filters: BTreeMap<&String, &String> = filters
            .iter()
            .filter(|(key, _)| {
                let valid = is_valid_filter_key(key);
                if !valid {
                    tracing::warn!(filter_key = %key, "dropping non-whitelisted filter key");
                }
                valid
            })
            .collect();

        let rows = sqlx::query("SELECT * FROM chunks").fetch_all(&self.pool).await?;

        let mut candidates = Vec::new();
        for row in rows {
            let meta: serde_json::Value =
                serde_json::from_str(&row.try_get::<String, _>("meta")?).unwrap_or_default();

            if !valid_filters.iter().all(|(k, v)| {
                meta.get(k.as_str()).and_then(|val| val.as_str()).map(|s| s == **v).unwrap_or(false)
            }) {
                continue;
            }

            let embedding: Vec<f32> =
                serde_json::from_str(&row.try_get::<String, _>("embedding")?).unwrap_or_default();
            let distance = l2_distance(query_embedding, &embedding);
            let token_start: i64 = row.try_get("token_start")?;
            let token_end: i64 = row.try_get("token_end")?;

            candidates.push(Candidate {
                distance,
                row: IndexRow {
                    chunk_id: row.try_get("chunk_id")?,
                    document_id: row.try_get("document_id")?,
                    content: row.try_get("content")?,
                    embedding,
                    meta,
                    token_count: row.try_get::<i64, _>("token_count")? as usize,
                    token_range: TokenRange {
                        start: token_start as usize,
                        end: token_end as usize,
                    },
                    document_total_tokens: row.try_get::<i64, _>("document_total_tokens")? as usize,
                    semantic_region: parse_region(&row.try_get::<String, _>("semantic_region")?),
                    source_url: row.try_get("source_url")?,
                    page_number: row.try_get::<Option<i64>, _>("page_number")?.map(|p| p as u32),
                    language: row.try_get("language")?,
                    ingest_time: row.try_get("ingest_time")?,
                    parser_version: row.try_get("parser_version")?,
                },
            });
        }

        candidates.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        candidates.truncate(raw_k);
        Ok(candidates)
    }

    async fn startup_sanity_check(&self) -> Result<(), VectorStoreError> {
        let table_exists: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='chunks'")
                .fetch_optional(&self.pool)
                .await?;
        if table_exists.is_none() {
            return Err(VectorStoreError::UnsupportedBackend(
                "table 'chunks' does not exist".to_string(),
            ));
        }
        tracing::warn!("sqlite backend has no ANN index; search performs a full table scan");
        Ok(())
    }
}

fn region_label(region: SemanticRegion) -> &'static str {
    match region {
        SemanticRegion::Intro => "intro",
        SemanticRegion::Early => "early",
        SemanticRegion::Middle => "middle",
        SemanticRegion::Late => "late",
        SemanticRegion::Footer => "footer",
        SemanticRegion::Unknown => "unknown",
    }
}

fn parse_region(label: &str) -> SemanticRegion {
    match label {
        "intro" => SemanticRegion::Intro,
        "early" => SemanticRegion::Early,
        "middle" => SemanticRegion::Middle,
        "late" => SemanticRegion::Late,
        "footer" => SemanticRegion::Footer,
        _ => SemanticRegion::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chunk::TokenRange;

    fn sample_row(chunk_id: &str, embedding: Vec<f32>) -> IndexRow {
        IndexRow {
            chunk_id: chunk_id.to_string(),
            document_id: "doc1".to_string(),
            content: "hello".to_string(),
            embedding,
            meta: serde_json::json!({"region": "gov"}),
            token_count: 10,
            token_range: TokenRange { start: 0, end: 10 },
            document_total_tokens: 100,
            semantic_region: SemanticRegion::Intro,
            source_url: None,
            page_number: None,
            language: None,
            ingest_time: "2026-01-01T00:00:00Z".to_string(),
            parser_version: "v1".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_search_orders_by_distance() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteVectorRowStore::new(pool);
        store.ensure_schema(2).await.unwrap();

        let rows = vec![
            sample_row("a", vec![0.0, 0.0]),
            sample_row("b", vec![1.0, 0.0]),
            sample_row("c", vec![5.0, 0.0]),
        ];
        let inserted = store.insert_batch(&rows).await.unwrap();
        assert_eq!(inserted, 3);

        let results = store
            .search(&[0.0, 0.0], 2, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row.chunk_id, "a");
        assert_eq!(results[1].row.chunk_id, "b");
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_conflict() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteVectorRowStore::new(pool);
        store.ensure_schema(2).await.unwrap();

        let row = sample_row("a", vec![0.0, 0.0]);
        assert_eq!(store.insert_batch(&[row.clone()]).await.unwrap(), 1);
        assert_eq!(store.insert_batch(&[row]).await.unwrap(), 0);
    }
}

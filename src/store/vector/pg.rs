//! PostgreSQL + pgvector backend — the literal SQL shape §4.4 specifies.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::Row;

use super::{Candidate, VectorRowStore, is_valid_filter_key, vector_literal};
use crate::error::VectorStoreError;
use crate::types::chunk::{SemanticRegion, TokenRange};
use crate::types::IndexRow;

pub struct PgVectorRowStore {
    pool: PgPool,
    table: String,
}

impl PgVectorRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: "chunks".to_string(),
        }
    }
}

#[async_trait]
impl VectorRowStore for PgVectorRowStore {
    async fn ensure_schema(&self, embed_dim: usize) -> Result<(), VectorStoreError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                chunk_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({embed_dim}) NOT NULL,
                meta JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                token_count BIGINT NOT NULL,
                token_start BIGINT NOT NULL,
                token_end BIGINT NOT NULL,
                document_total_tokens BIGINT NOT NULL,
                semantic_region TEXT NOT NULL,
                source_url TEXT,
                page_number INT,
                language TEXT,
                ingest_time TEXT NOT NULL,
                parser_version TEXT NOT NULL
            )",
            table = self.table,
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        let index_ddl = format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_hnsw ON {table}
             USING hnsw (embedding vector_l2_ops)",
            table = self.table,
        );
        sqlx::query(&index_ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn exists(&self, chunk_id: &str) -> Result<bool, VectorStoreError> {
        let query = format!("SELECT 1 FROM {} WHERE chunk_id = $1", self.table);
        let row = sqlx::query(&query)
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_batch(&self, rows: &[IndexRow]) -> Result<u64, VectorStoreError> {
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        let insert_sql = format!(
            "INSERT INTO {table}
                (chunk_id, document_id, content, embedding, meta, token_count,
                 token_start, token_end, document_total_tokens, semantic_region,
                 source_url, page_number, language, ingest_time, parser_version)
             VALUES ($1,$2,$3,$4::vector,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
             ON CONFLICT (chunk_id) DO NOTHING",
            table = self.table,
        );

        for row in rows {
            let result = sqlx::query(&insert_sql)
                .bind(&row.chunk_id)
                .bind(&row.document_id)
                .bind(&row.content)
                .bind(vector_literal(&row.embedding))
                .bind(&row.meta)
                .bind(row.token_count as i64)
                .bind(row.token_range.start as i64)
                .bind(row.token_range.end as i64)
                .bind(row.document_total_tokens as i64)
                .bind(region_label(row.semantic_region))
                .bind(&row.source_url)
                .bind(row.page_number.map(|p| p as i32))
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
        let vec_literal = vector_literal(query_embedding);

        let mut sorted_filters: Vec<(&String, &String)> = filters
            .iter()
            .filter(|(key, _)| {
                let valid = is_valid_filter_key(key);
                if !valid {
                    tracing::warn!(filter_key = %key, "dropping non-whitelisted filter key");
                }
                valid
            })
            .collect();
        sorted_filters.sort_by_key(|(k, _)| k.as_str());

        let mut where_clauses = Vec::new();
        let mut bind_index = 2; // $1 is the distance vector param
        for (key, _) in &sorted_filters {
            where_clauses.push(format!("meta->>'{key}' = ${bind_index}"));
            bind_index += 1;
        }
        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let query = format!(
            "SELECT chunk_id, document_id, content, meta, token_count, token_start,
                    token_end, document_total_tokens, semantic_region, source_url,
                    page_number, language, ingest_time, parser_version,
                    (embedding <-> $1::vector) AS distance
             FROM {table}
             {where_sql}
             ORDER BY embedding <-> $1::vector
             LIMIT ${limit_idx}",
            table = self.table,
            limit_idx = bind_index,
        );

        let mut q = sqlx::query(&query).bind(&vec_literal);
        for (_, value) in &sorted_filters {
            q = q.bind((*value).clone());
        }
        q = q.bind(raw_k as i64);

        let rows = q.fetch_all(&self.pool).await?;
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let distance: f32 = row.try_get("distance")?;
            let token_start: i64 = row.try_get("token_start")?;
            let token_end: i64 = row.try_get("token_end")?;
            candidates.push(Candidate {
                distance,
                row: IndexRow {
                    chunk_id: row.try_get("chunk_id")?,
                    document_id: row.try_get("document_id")?,
                    content: row.try_get("content")?,
                    embedding: Vec::new(),
                    meta: row.try_get("meta")?,
                    token_count: row.try_get::<i64, _>("token_count")? as usize,
                    token_range: TokenRange {
                        start: token_start as usize,
                        end: token_end as usize,
                    },
                    document_total_tokens: row.try_get::<i64, _>("document_total_tokens")? as usize,
                    semantic_region: parse_region(&row.try_get::<String, _>("semantic_region")?),
                    source_url: row.try_get("source_url")?,
                    page_number: row.try_get::<Option<i32>, _>("page_number")?.map(|p| p as u32),
                    language: row.try_get("language")?,
                    ingest_time: row.try_get("ingest_time")?,
                    parser_version: row.try_get("parser_version")?,
                },
            });
        }
        Ok(candidates)
    }

    async fn startup_sanity_check(&self) -> Result<(), VectorStoreError> {
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await?;
        if !table_exists {
            return Err(VectorStoreError::UnsupportedBackend(format!(
                "table '{}' does not exist",
                self.table
            )));
        }

        let index_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)")
                .bind(format!("{}_embedding_hnsw", self.table))
                .fetch_one(&self.pool)
                .await?;
        if !index_exists {
            tracing::warn!(table = %self.table, "no HNSW index found on embedding column; queries will fall back to a slow sequential scan");
        }
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

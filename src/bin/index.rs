//! Indexing pipeline entry point: chunk one raw document, materialize its
//! chunk file + manifest, and embed/insert into the vector row store
//! (§2 "Control flow (indexing)").
//!
//! Source acquisition (the crawler) is out of scope (spec §1); this binary
//! takes an already-fetched raw object's bytes from local disk plus its
//! key/content-type, mirroring the boundary the spec draws around OS.

use std::path::PathBuf;

use anyhow::{bail, Context};
use civic_rag::chunking::{chunk_document, html::HtmlExtractor, image::ImageExtractor, pdf::PdfExtractor, tokenizer, ChunkKind, ChunkingParams, FormatExtractor};
use civic_rag::clients::HttpEmbedder;
use civic_rag::config::{Config, StorageBackend};
use civic_rag::index::{index_chunks, IndexerOutcome};
use civic_rag::materialize::{chunk_file_key, materialize};
use civic_rag::store::{LocalObjectStore, ObjectStore, PgVectorRowStore, VectorRowStore};
use civic_rag::telemetry;
use civic_rag::types::RawManifest;
use sha2::{Digest, Sha256};

/// Exit-code taxonomy for this binary (§4.3, §7): a schema skip, an
/// unsupported object-store backend, and a DB initialization failure each
/// get their own distinct exit code instead of falling through to anyhow's
/// generic `1` for every failure.
const EXIT_SCHEMA_SKIPS: i32 = 3;
const EXIT_UNSUPPORTED_BACKEND: i32 = 4;
const EXIT_DB_INIT_FAILURE: i32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    telemetry::init(config.log_format);

    let mut args = std::env::args().skip(1);
    let document_id = args.next().context("usage: civic-rag-index <document_id> <format> <path>")?;
    let format = args.next().context("missing format: html|pdf|image")?;
    let path = PathBuf::from(args.next().context("missing path to raw bytes")?);

    let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let sha256 = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let manifest = RawManifest {
        file_hash: sha256.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        original_url: None,
        tags: Vec::new(),
        trust_level: civic_rag::types::raw::default_trust_level(),
        last_updated: None,
        language: None,
        chunked: None,
        saved_chunks: None,
        chunked_manifest_written_at: None,
    };

    let (extraction, kind): (_, ChunkKind) = match format.as_str() {
        "html" => (HtmlExtractor.canonicalize(&bytes, &manifest)?, ChunkKind::Html),
        "pdf" => (PdfExtractor.canonicalize(&bytes, &manifest)?, ChunkKind::Pdf),
        "image" => (ImageExtractor.canonicalize(&bytes, &manifest)?, ChunkKind::Image),
        other => bail!("unsupported format: {other}"),
    };

    let tokenizer = tokenizer::get_tokenizer("cl100k_base");
    let params = ChunkingParams {
        min_tokens: config.min_tokens_per_chunk,
        max_tokens: config.max_tokens_per_chunk,
        overlap_sentences: config.overlap_sentences,
        tokenizer: tokenizer.as_ref(),
        parser_version: config.parser_version.clone(),
        ingest_time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };

    let raw_key = format!("{}/{document_id}", config.raw_prefix);
    let chunks = chunk_document(&document_id, &extraction, kind, &manifest, &sha256, &raw_key, &params);
    if chunks.is_empty() {
        tracing::warn!(%document_id, "extraction yielded zero chunks; nothing to index");
        return Ok(());
    }

    let object_store: Box<dyn ObjectStore> = match config.storage {
        StorageBackend::Local => Box::new(LocalObjectStore::new(".")),
        StorageBackend::S3 => {
            tracing::error!("S3 object store wiring is left to the deployment harness");
            std::process::exit(EXIT_UNSUPPORTED_BACKEND);
        }
    };

    let outcome = materialize(
        object_store.as_ref(),
        &document_id,
        &raw_key,
        &chunks,
        &config.chunked_prefix,
        &config.chunked_schema_version,
        &config.parser_version,
    )
    .await
    .context("materializing chunks")?;
    tracing::info!(%document_id, ?outcome, "materialize complete");

    let vrs = match init_vector_store(&config).await {
        Ok(vrs) => vrs,
        Err(e) => {
            tracing::error!(error = ?e, "vector row store initialization failed");
            std::process::exit(EXIT_DB_INIT_FAILURE);
        }
    };

    let chunk_key = chunk_file_key(&config.chunked_prefix, &config.chunked_schema_version, &document_id);
    let embedder = HttpEmbedder::new(&config.embedder_url, config.embed_dim);
    let index_outcome =
        index_chunks(&vrs, &embedder, object_store.as_ref(), &chunk_key, config.embed_dim, config.batch_size)
            .await
            .context("indexing chunks")?;

    match index_outcome {
        IndexerOutcome::Ok { inserted, skipped_existing } => {
            tracing::info!(%document_id, inserted, skipped_existing, "index complete");
            Ok(())
        }
        IndexerOutcome::SchemaSkips { count } => {
            tracing::error!(%document_id, count, "chunk line(s) failed schema validation");
            std::process::exit(EXIT_SCHEMA_SKIPS);
        }
    }
}

/// Connect, ensure schema, and sanity-check the vector row store as one
/// fallible step so every way this can fail maps to the same distinct DB
/// init exit code.
async fn init_vector_store(config: &Config) -> anyhow::Result<PgVectorRowStore> {
    let pool = sqlx::PgPool::connect(&config.database_url).await.context("connecting to vector row store")?;
    let vrs = PgVectorRowStore::new(pool);
    vrs.ensure_schema(config.embed_dim).await.context("ensuring vrs schema")?;
    vrs.startup_sanity_check().await.context("vrs startup sanity check")?;
    Ok(vrs)
}

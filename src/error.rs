//! Crate-wide error taxonomy.
//!
//! Each pipeline stage owns a leaf error enum; the orchestrator never lets a
//! raw error escape to a client — it is always converted to one of the four
//! [`crate::types::response::Resolution`] values at the boundary.

use thiserror::Error;

/// Errors raised while extracting and windowing a document.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("html extraction failed: {0}")]
    Html(String),

    #[error("pdf extraction failed: {0}")]
    Pdf(String),

    #[error("image ocr failed: {0}")]
    Image(String),

    #[error("tokenizer unavailable: {0}")]
    Tokenizer(String),
}

/// Errors raised while writing chunk files and raw manifests.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("manifest serialization failed: {0}")]
    Manifest(#[source] serde_json::Error),

    #[error("chunk serialization failed: {0}")]
    Chunk(#[source] serde_json::Error),
}

/// Errors raised while building the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("vector row store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk file not found: {0}")]
    ChunkFileMissing(String),
}

/// Errors raised while serving a k-NN retrieval request.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("vector row store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Errors raised by the object store abstraction (OS).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("put failed after {attempts} attempt(s): {reason}")]
    PutExhausted { attempts: u32, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised by the vector row store abstraction (VRS).
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("unsupported vector backend: {0}")]
    UnsupportedBackend(String),

    #[error("filter key rejected (must match ^[A-Za-z0-9_]+$): {0}")]
    InvalidFilterKey(String),
}

/// Errors raised by the embedder collaborator (EMB).
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedder returned dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised by the generator collaborator (GEN).
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generator timed out")]
    TimedOut,
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Errors surfaced by the query orchestrator before a `Resolution` is formed.
///
/// Distinct from `Resolution` itself: these represent collaborator failures
/// that the orchestrator catches and folds into a resolution, not the
/// resolution contract that leaves the crate.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("retrieval failed: {0}")]
    Retrieve(#[from] RetrieveError),

    #[error("generator failed: {0}")]
    Generator(#[from] GeneratorError),
}

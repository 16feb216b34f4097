//! Embedder (EMB): synchronous service mapping text to a fixed-dimension
//! vector (§2, §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmbedderError;

/// Collaborator abstraction so indexing/retrieval never depend on a
/// concrete embedding provider (§9 "Cyclic graphs / global state").
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP client for the managed embedding service, retrying transient
/// failures with exponential backoff (§5 "Retries": 1-2 attempts, base
/// delay 0.05-0.25s x 2^attempt).
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    embed_dim: usize,
    max_attempts: u32,
    base_delay: std::time::Duration,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, embed_dim: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            embed_dim,
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match self
                .client
                .post(&self.url)
                .json(&EmbedRequest { text })
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
            {
                Ok(response) => {
                    let body: EmbedResponse = response.json().await?;
                    if body.embedding.len() != self.embed_dim {
                        return Err(EmbedderError::DimensionMismatch {
                            expected: self.embed_dim,
                            actual: body.embedding.len(),
                        });
                    }
                    return Ok(body.embedding);
                }
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(self.base_delay * 2u32.pow(attempt)).await;
                }
            }
        }
        Err(EmbedderError::Request(last_err.expect("at least one attempt is always made")))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Deterministic in-memory embedder for unit tests: every distinct text
    /// maps to a distinct vector derived from its byte sum, so cosine/L2
    /// comparisons in retriever tests are meaningful without a real model.
    pub struct MockEmbedder {
        pub dim: usize,
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
            let seed: f32 = text.bytes().map(|b| b as f32).sum::<f32>() / 255.0;
            Ok((0..self.dim).map(|i| seed + i as f32 * 0.001).collect())
        }
    }
}

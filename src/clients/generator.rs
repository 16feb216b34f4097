//! Generator (GEN): synchronous constrained text generator (§2, §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::retrieve::Passage;

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub request_id: &'a str,
    pub language: &'a str,
    pub question: &'a str,
    pub passages: &'a [Passage],
}

/// Either shape the service may answer with: `answer_lines` is preferred,
/// falling back to a single unstructured `text` field (§4.5 step 6).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Lines { answer_lines: Vec<GeneratedLine> },
    Text { text: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedLine {
    pub text: String,
}

impl GenerateResponse {
    pub fn not_enough_information() -> Self {
        Self::Text { text: "NOT_ENOUGH_INFORMATION".to_string() }
    }
}

/// Collaborator abstraction over the constrained LLM generator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GenerateResponse, GeneratorError>;
}

/// HTTP client for the managed generation service.
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GenerateResponse, GeneratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Returns a fixed response regardless of input; tests configure the
    /// text to exercise each orchestrator branch (§8 scenarios).
    pub struct FixedGenerator {
        pub response: GenerateResponse,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(&self, _request: GenerateRequest<'_>) -> Result<GenerateResponse, GeneratorError> {
            Ok(self.response.clone())
        }
    }
}

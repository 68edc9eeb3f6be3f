//! Client for the external model service: chat-style generation for concept
//! extraction and an embedding endpoint for concept vectors. The trait seam
//! exists so tests can script responses without a network.

pub mod embedding;
pub mod extract;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::config::{CHAT_TIMEOUT, EMBED_TIMEOUT};

/// Failure of a single model-service call, split by whether a retry can
/// plausibly help. Only the embedding client retries, and only transients.
#[derive(Debug, thiserror::Error)]
pub enum ModelCallError {
    #[error("transient model-service failure: {0}")]
    Transient(String),
    #[error("model service rejected the request: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    /// Context-window hint forwarded to the service.
    pub num_ctx: u32,
}

#[async_trait]
pub trait ModelService: Send + Sync {
    /// One chat completion; returns the generated string.
    async fn chat(&self, request: ChatRequest) -> Result<String, ModelCallError>;

    /// One embedding vector for `prompt`.
    async fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>, ModelCallError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpModelService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpModelService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn classify(e: reqwest::Error) -> ModelCallError {
        match e.status() {
            Some(status) if status.is_client_error() => {
                ModelCallError::Permanent(format!("status {status}"))
            }
            Some(status) => ModelCallError::Transient(format!("status {status}")),
            None => ModelCallError::Transient(e.to_string()),
        }
    }
}

#[async_trait]
impl ModelService for HttpModelService {
    async fn chat(&self, request: ChatRequest) -> Result<String, ModelCallError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(CHAT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(Self::classify)?
            .error_for_status()
            .map_err(Self::classify)?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Permanent(format!("malformed chat response: {e}")))?;
        Ok(body.response)
    }

    async fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>, ModelCallError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(EMBED_TIMEOUT)
            .json(&EmbedRequest { model, prompt })
            .send()
            .await
            .map_err(Self::classify)?
            .error_for_status()
            .map_err(Self::classify)?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Permanent(format!("malformed embed response: {e}")))?;
        if body.embedding.is_empty() {
            return Err(ModelCallError::Permanent("empty embedding".to_string()));
        }
        Ok(body.embedding)
    }
}

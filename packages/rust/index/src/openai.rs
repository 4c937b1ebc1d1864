//! OpenAI-compatible embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rfpcheck_shared::{Result, RfpCheckError};

use crate::embedding::EmbeddingProvider;

/// Embeddings client for `{base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiEmbedder {
    /// Build a client authenticating with `api_key`.
    pub fn new(api_key: &str, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RfpCheckError::config("missing OpenAI API key"));
        }
        if model.trim().is_empty() {
            return Err(RfpCheckError::config("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| RfpCheckError::config("invalid OpenAI API key"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RfpCheckError::Service(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        debug!(inputs = inputs.len(), model = %self.model, "requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RfpCheckError::Service(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RfpCheckError::Service(format!(
                "embeddings request returned {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RfpCheckError::Service(format!("invalid embeddings response: {e}")))?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(RfpCheckError::Service(format!(
                "embedding service returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

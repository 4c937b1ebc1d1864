//! Language-model completion clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rfpcheck_shared::{OpenAiConfig, Result, RfpCheckError};

/// Turns a prompt into a text completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

// ---------------------------------------------------------------------------
// OpenAI chat completions
// ---------------------------------------------------------------------------

/// Client for `{base_url}/chat/completions` sending one user message.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RfpCheckError::config("missing OpenAI API key"));
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
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            temperature,
        })
    }

    /// Build from the `[openai]` config section and a resolved key.
    pub fn from_config(config: &OpenAiConfig, api_key: &str) -> Result<Self> {
        Self::new(
            api_key,
            &config.base_url,
            &config.chat_model,
            config.temperature,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "requesting completion");

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RfpCheckError::Service(format!("chat completion request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RfpCheckError::Service(format!(
                "chat completion returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RfpCheckError::Service(format!("invalid chat completion response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RfpCheckError::Service("chat completion returned no choices".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

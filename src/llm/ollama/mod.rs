
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatBackend, ChatMessage, GenerationOptions};
use crate::RagError;
use crate::config::LlmConfig;
use crate::embeddings::OllamaClient;

/// Generation on CPU-only machines can take minutes
const CHAT_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// [`ChatBackend`] backed by Ollama's `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
}

impl OllamaChat {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let client = OllamaClient::from_url(base_url, &config.model)
            .with_timeout(Duration::from_secs(CHAT_TIMEOUT_SECONDS))
            .with_retry_attempts(1);

        Ok(Self::with_client(client))
    }

    #[inline]
    pub fn with_client(client: OllamaClient) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    /// Blocking chat call
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage], options: GenerationOptions) -> Result<String> {
        let request = ChatRequest {
            model: self.client.model(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response_text = self
            .client
            .post_json("/api/chat", &request)
            .context("Failed to get chat completion")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        debug!(
            "Chat reply with {} characters",
            response.message.content.len()
        );
        Ok(response.message.content)
    }
}

#[async_trait]
impl ChatBackend for OllamaChat {
    #[inline]
    fn model_name(&self) -> &str {
        self.client.model()
    }

    #[inline]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> crate::Result<String> {
        let chat = self.clone();
        let messages = messages.to_vec();

        tokio::task::spawn_blocking(move || chat.chat(&messages, options))
            .await
            .map_err(|e| RagError::Synthesis(format!("Chat task failed: {}", e)))?
            .map_err(|e| RagError::Synthesis(format!("{:#}", e)))
    }

    #[inline]
    async fn list_models(&self) -> crate::Result<Vec<String>> {
        let client = self.client.clone();

        let models = tokio::task::spawn_blocking(move || client.list_models())
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("Model listing task failed: {}", e)))??;

        Ok(models.into_iter().map(|model| model.name).collect())
    }
}

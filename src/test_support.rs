// Deterministic stand-ins for the model backends

use async_trait::async_trait;
use std::sync::Mutex;

use crate::embeddings::{Embedder, normalize_l2};
use crate::llm::{ChatBackend, ChatMessage, GenerationOptions};
use crate::{RagError, Result};

pub(crate) const TEST_DIMENSION: usize = 32;

/// Bag-of-words hashing: texts sharing words land close together
pub(crate) struct HashingEmbedder;

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-test"
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; TEST_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % TEST_DIMENSION] += 1.0;
        }
        Ok(normalize_l2(vector))
    }
}

/// Replies with a fixed text and remembers every prompt it saw
pub(crate) struct ScriptedChat {
    reply: std::result::Result<String, String>,
    pub(crate) prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// User prompt of the most recent request
    pub(crate) fn last_user_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .ok()?
            .last()
            .and_then(|messages| messages.last())
            .map(|message| message.content.clone())
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: GenerationOptions,
    ) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        self.reply.clone().map_err(RagError::Synthesis)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        match &self.reply {
            Ok(_) => Ok(vec!["mistral:latest".to_string(), "nomic-embed-text:latest".to_string()]),
            Err(message) => Err(RagError::Other(anyhow::anyhow!(message.clone()))),
        }
    }
}

// Answer synthesis against a local chat model


pub mod ollama;

pub use ollama::OllamaChat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{RagError, Result};

/// Language policy and citation rules sent with every request
pub const DEFAULT_SYSTEM_PROMPT: &str = "Du bist ein präziser Recherche-Assistent, der NUR auf Deutsch antwortet.

PRIORITÄT 1: Wenn Informationen in den bereitgestellten Dokumenten verfügbar sind:
- Verwende AUSSCHLIESSLICH diese dokumentierten Informationen
- Bei JEDER Information aus den Dokumenten MUSST du die genaue Quelle in Klammern direkt dahinter angeben
- Format für Dokumentquellen: (Quelle: Dokumentname, Seite X)

PRIORITÄT 2: Wenn keine relevanten Informationen in den Dokumenten zu finden sind:
- Gib klar an: \"In den verfügbaren Dokumenten konnte ich keine spezifischen Informationen zu dieser Frage finden.\"
- Danach kannst du eine allgemeine Antwort basierend auf deinem eigenen Wissen geben, aber kennzeichne diese klar mit: \"[Allgemeinwissen]\"

Formatierungsanweisungen:
1. Gliedere deine Antwort in klare Absätze
2. Stelle die wichtigsten Informationen an den Anfang
3. Nenne bei JEDER Information aus Dokumenten die Quelle als (Quelle: Dokumentname, Seite X)
4. Trenne dokumentierte Informationen klar von allgemeinem Wissen";

/// Prefix the model must put in front of answers not backed by documents
pub const GENERAL_KNOWLEDGE_MARKER: &str = "[Allgemeinwissen]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling settings for one completion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4000,
        }
    }
}

/// A chat-completion endpoint
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the conversation and return the assistant reply text
    async fn complete(&self, messages: &[ChatMessage], options: GenerationOptions)
    -> Result<String>;

    /// Names of the models the backend can serve
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Build the user prompt for `question`, grounded in `context_text` when any was found
#[inline]
pub fn build_user_prompt(question: &str, context_text: &str) -> String {
    if context_text.trim().is_empty() {
        format!(
            "\nZu folgender Frage wurden keine relevanten Informationen in den Dokumenten gefunden: \"{question}\"\n\n\
             Bitte antworte wie folgt:\n\
             1. Erwähne zuerst, dass keine spezifischen Informationen in den Dokumenten gefunden wurden\n\
             2. Gib dann eine allgemeine Antwort basierend auf deinem Wissen, deutlich mit \"{GENERAL_KNOWLEDGE_MARKER}:\" gekennzeichnet"
        )
    } else {
        format!(
            "Beantworte folgende Frage basierend auf den gegebenen Dokumentausschnitten. \
             Verwende NUR Informationen aus diesen Ausschnitten und gib für jede Information \
             die Quelle mit Dokumentnamen und Seitenzahl an.\n\n\
             Frage: {question}\n\n\
             Hier sind die relevanten Dokumentausschnitte:\n\n\
             {context_text}"
        )
    }
}

/// Turns a question plus retrieved context into a model reply
pub struct AnswerSynthesizer {
    backend: Arc<dyn ChatBackend>,
    system_prompt: String,
    options: GenerationOptions,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            options: GenerationOptions::default(),
        }
    }

    #[inline]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[inline]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// Ask the model. An empty `context_text` selects the general-knowledge prompt.
    #[inline]
    pub async fn synthesize(&self, question: &str, context_text: &str) -> Result<String> {
        let user_prompt = build_user_prompt(question, context_text);
        debug!(
            "Sending prompt to {} ({} characters)",
            self.backend.model_name(),
            user_prompt.len()
        );

        let messages = [
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(user_prompt),
        ];

        match self.backend.complete(&messages, self.options).await {
            Ok(reply) => {
                info!("Received reply from {}", self.backend.model_name());
                Ok(reply)
            }
            Err(RagError::Synthesis(message)) => {
                error!("Chat completion failed: {}", message);
                Err(RagError::Synthesis(message))
            }
            Err(e) => {
                error!("Chat completion failed: {}", e);
                Err(RagError::Synthesis(e.to_string()))
            }
        }
    }
}

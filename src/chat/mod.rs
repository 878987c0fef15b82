// Online question answering: retrieve, synthesize, extract citations

#[cfg(test)]
mod tests;

use serde::Serialize;
use tracing::info;

use crate::Result;
use crate::citations::{Citation, extract_citations};
use crate::llm::AnswerSynthesizer;
use crate::retrieval::{ContextBuilder, RetrievalResult, SearchMode};

/// Reply body of a chat turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub sources: Vec<Citation>,
    #[serde(skip)]
    pub retrieval_mode: SearchMode,
    #[serde(skip)]
    pub excerpts_used: usize,
}

pub struct ChatService {
    retriever: ContextBuilder,
    synthesizer: AnswerSynthesizer,
}

impl ChatService {
    #[inline]
    pub fn new(retriever: ContextBuilder, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            retriever,
            synthesizer,
        }
    }

    #[inline]
    pub fn retriever(&self) -> &ContextBuilder {
        &self.retriever
    }

    #[inline]
    pub fn synthesizer(&self) -> &AnswerSynthesizer {
        &self.synthesizer
    }

    /// Answer `message` from the indexed documents.
    ///
    /// Retrieval problems degrade to a general-knowledge answer; only a failed
    /// model call is an error.
    #[inline]
    pub async fn answer(&self, message: &str) -> Result<ChatReply> {
        info!("Chat request: {}", message);

        let context = self.retriever.build_context(message).await;
        self.answer_with_context(message, &context).await
    }

    #[inline]
    pub async fn answer_with_context(
        &self,
        message: &str,
        context: &RetrievalResult,
    ) -> Result<ChatReply> {
        if context.is_empty() {
            info!("No relevant documents found, answering from general knowledge");
        } else {
            info!(
                "{} excerpts ({} estimated tokens) sent as context",
                context.documents.len(),
                context.estimated_tokens
            );
        }

        let reply = self
            .synthesizer
            .synthesize(message, &context.context_text)
            .await?;
        let sources = extract_citations(&reply);

        Ok(ChatReply {
            reply,
            sources,
            retrieval_mode: context.mode,
            excerpts_used: context.documents.len(),
        })
    }
}

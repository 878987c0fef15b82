use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to extract text from {document}: {message}")]
    Extraction { document: String, message: String },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Wrap a backend failure, keeping the full cause chain in the message
    #[inline]
    pub fn store(cause: impl std::fmt::Display) -> Self {
        Self::Store(format!("{:#}", cause))
    }
}

pub mod chat;
pub mod citations;
pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod embeddings;
pub mod extract;
pub mod indexer;
pub mod llm;
pub mod retrieval;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

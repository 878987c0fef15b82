// Indexer module
// Turns a directory of documents into embedded records in the vector store


use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ConfigError;
use crate::database::{Distance, VectorRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::{ChunkingConfig, DocumentChunk, chunk_document};
use crate::extract::{DocumentFormat, extract_file};
use crate::{RagError, Result};

/// How record ids are derived for indexed chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Ids include the import time, so every run appends a fresh copy
    #[default]
    Append,
    /// Ids depend only on file name, chunk position and content, so reruns overwrite
    ContentHash,
}

impl FromStr for IdPolicy {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "content_hash" | "content-hash" => Ok(Self::ContentHash),
            other => Err(ConfigError::InvalidIdPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for IdPolicy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::ContentHash => write!(f, "content_hash"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexingConfig {
    pub id_policy: IdPolicy,
}

/// Statistics about one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingStats {
    pub documents_found: usize,
    pub documents_indexed: usize,
    /// Documents that produced no text
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub records_stored: usize,
}

/// Outcome of a single document
enum DocumentOutcome {
    Indexed { chunks: usize, stored: usize },
    Empty,
}

/// Derive a stable record id. Qdrant only accepts UUIDs or integers, so the
/// readable key is folded into a name-based UUID.
#[inline]
pub fn record_id(policy: IdPolicy, import_stamp: i64, chunk: &DocumentChunk) -> String {
    let key = match policy {
        IdPolicy::Append => format!(
            "{}_{}_{}",
            import_stamp, chunk.document_name, chunk.chunk_index
        ),
        IdPolicy::ContentHash => format!(
            "{}\u{0}{}\u{0}{}",
            chunk.document_name, chunk.chunk_index, chunk.content
        ),
    };
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Supported files directly inside `dir`, sorted by name
#[inline]
pub async fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut documents = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if DocumentFormat::from_path(&path).is_supported() {
            documents.push(path);
        } else {
            debug!("Ignoring unsupported file {}", path.display());
        }
    }

    documents.sort();
    Ok(documents)
}

/// Sequential extract, chunk, embed and store pipeline
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    chunking: ChunkingConfig,
    id_policy: IdPolicy,
}

impl Indexer {
    #[inline]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
        chunking: ChunkingConfig,
        id_policy: IdPolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
            chunking,
            id_policy,
        }
    }

    /// Drop and recreate the target collection
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        warn!("Resetting collection {}", self.collection);
        self.store
            .reset(&self.collection, self.embedder.dimension(), Distance::Cosine)
            .await
    }

    /// Index every supported document directly inside `dir`.
    ///
    /// A failing document is logged and counted, including a rejected write; the
    /// run continues with the next one. Collection setup failures and
    /// configuration errors abort the run.
    #[inline]
    pub async fn index(&self, dir: &Path) -> Result<IndexingStats> {
        if !dir.exists() {
            info!("Creating documents directory {}", dir.display());
            tokio::fs::create_dir_all(dir).await?;
        }

        let documents = discover_documents(dir).await?;
        let mut stats = IndexingStats {
            documents_found: documents.len(),
            ..IndexingStats::default()
        };

        if documents.is_empty() {
            warn!("No supported documents found in {}", dir.display());
            return Ok(stats);
        }
        info!("{} documents found in {}", documents.len(), dir.display());

        self.store
            .ensure_collection(&self.collection, self.embedder.dimension(), Distance::Cosine)
            .await?;

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(documents.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        for path in &documents {
            let name = document_name(path);
            bar.set_message(name.clone());

            match self.index_document(path, &name).await {
                Ok(DocumentOutcome::Indexed { chunks, stored }) => {
                    stats.documents_indexed += 1;
                    stats.chunks_created += chunks;
                    stats.records_stored += stored;
                    info!("Indexed {} ({} chunks)", name, chunks);
                }
                Ok(DocumentOutcome::Empty) => {
                    stats.documents_skipped += 1;
                    warn!("No text extracted from {}, skipping", name);
                }
                Err(e @ RagError::Configuration(_)) => {
                    bar.abandon();
                    error!("Aborting indexing run at {}: {}", name, e);
                    return Err(e);
                }
                Err(e) => {
                    stats.documents_failed += 1;
                    error!("Failed to index {}: {}", name, e);
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        info!(
            "Indexing complete: {} indexed, {} skipped, {} failed, {} records stored",
            stats.documents_indexed,
            stats.documents_skipped,
            stats.documents_failed,
            stats.records_stored
        );
        Ok(stats)
    }

    async fn index_document(&self, path: &Path, name: &str) -> Result<DocumentOutcome> {
        let format = DocumentFormat::from_path(path);
        let text = extract_file(path).await?;

        if text.trim().is_empty() {
            return Ok(DocumentOutcome::Empty);
        }
        debug!("Extracted {} characters from {}", text.len(), name);

        let chunks = chunk_document(
            &text,
            name,
            path.to_path_buf(),
            format.is_pdf(),
            &self.chunking,
        );
        let import_stamp = Utc::now().timestamp_millis();

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self.embedder.embed(&chunk.content).await?;
            records.push(VectorRecord {
                id: record_id(self.id_policy, import_stamp, chunk),
                vector,
                content: chunk.content.clone(),
                document_name: chunk.document_name.clone(),
                page_number: chunk.estimated_page_number,
                source_path: Some(chunk.source_path.display().to_string()),
                created_at: Utc::now(),
            });
        }

        let stored = self.store.upsert(&self.collection, &records).await?;
        Ok(DocumentOutcome::Indexed {
            chunks: chunks.len(),
            stored,
        })
    }
}

fn document_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

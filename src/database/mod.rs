// Vector storage behind a single trait, with Qdrant, LanceDB and in-memory backends

pub mod lancedb;
pub mod memory;
pub mod qdrant;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::Result;

pub use self::lancedb::LanceDbStore;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

/// Hard ceiling on records sent to a backend in one write
pub const UPSERT_BATCH_LIMIT: usize = 100;

/// A persisted unit in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub document_name: String,
    pub page_number: u32,
    pub source_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distance {
    #[default]
    Cosine,
}

impl fmt::Display for Distance {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "Cosine"),
        }
    }
}

/// Whitespace-delimited query words used by keyword search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Split `query` on whitespace, dropping repeats
    #[inline]
    pub fn parse(query: &str) -> Self {
        Self(
            query
                .split_whitespace()
                .map(str::to_string)
                .unique()
                .collect(),
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn words(&self) -> &[String] {
        &self.0
    }

    /// Case-insensitive match of any word against `content`
    #[inline]
    pub fn matches(&self, content: &str) -> bool {
        let content = content.to_lowercase();
        self.0
            .iter()
            .any(|word| content.contains(&word.to_lowercase()))
    }
}

/// What to search a collection with
#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Rank by cosine similarity, dropping results scored below `min_score`
    Semantic { vector: Vec<f32>, min_score: f32 },
    /// Degraded mode: unranked records containing any of the words
    Keyword(KeywordSet),
}

/// A search hit. `score` is `None` for keyword hits, which are not comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecord {
    pub content: String,
    pub document_name: String,
    pub page_number: u32,
    pub score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub name: String,
    pub exists: bool,
    pub count: u64,
    pub dimensions: Option<usize>,
    /// Filled in by the caller; stores do not know which model wrote the vectors
    pub embedding_model: Option<String>,
}

impl CollectionStats {
    #[inline]
    pub fn missing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exists: false,
            count: 0,
            dimensions: None,
            embedding_model: None,
        }
    }
}

/// Storage for embedded chunks grouped into named collections
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend identifier for logs and status output
    fn backend_name(&self) -> &'static str;

    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|collection| collection == name))
    }

    /// Create the collection unless it exists. An existing collection with a
    /// different dimensionality is a configuration error.
    async fn ensure_collection(&self, name: &str, dimensions: usize, distance: Distance)
    -> Result<()>;

    /// Write at most [`UPSERT_BATCH_LIMIT`] records, overwriting matching ids
    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()>;

    /// Write any number of records, split into backend-sized batches
    async fn upsert(&self, name: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut stored = 0;
        for batch in records.chunks(UPSERT_BATCH_LIMIT) {
            self.upsert_batch(name, batch).await?;
            stored += batch.len();
            debug!("{}/{} records stored in {}", stored, records.len(), name);
        }
        Ok(stored)
    }

    async fn search(
        &self,
        name: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Drop the collection and create it again, empty
    async fn reset(&self, name: &str, dimensions: usize, distance: Distance) -> Result<()>;

    async fn stats(&self, name: &str) -> Result<CollectionStats>;
}


use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{CollectionStats, Distance, ScoredRecord, SearchQuery, VectorRecord, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::{RagError, Result};

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    /// Insertion order is the keyword-mode result order
    records: Vec<VectorRecord>,
    positions: HashMap<String, usize>,
}

/// Process-local store with brute-force cosine search. Nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

fn scored(record: &VectorRecord, score: Option<f32>) -> ScoredRecord {
    ScoredRecord {
        content: record.content.clone(),
        document_name: record.document_name.clone(),
        page_number: record.page_number,
        score,
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    #[inline]
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    #[inline]
    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    #[inline]
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(RagError::Configuration(format!(
                    "Collection {} has {} dimensions but {} were requested",
                    name, existing.dimensions, dimensions
                )));
            }
            debug!("Collection {} already exists", name);
            return Ok(());
        }

        collections.insert(
            name.to_string(),
            Collection {
                dimensions,
                ..Collection::default()
            },
        );
        info!(
            "Created in-memory collection {} ({} dimensions, {})",
            name, dimensions, distance
        );
        Ok(())
    }

    #[inline]
    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::Store(format!("Collection {} does not exist", name)))?;

        if let Some(bad) = records
            .iter()
            .find(|record| record.vector.len() != collection.dimensions)
        {
            return Err(RagError::Store(format!(
                "Record {} has {} dimensions, collection {} expects {}",
                bad.id,
                bad.vector.len(),
                name,
                collection.dimensions
            )));
        }

        for record in records {
            if let Some(&position) = collection.positions.get(&record.id) {
                collection.records[position] = record.clone();
            } else {
                collection
                    .positions
                    .insert(record.id.clone(), collection.records.len());
                collection.records.push(record.clone());
            }
        }

        debug!("Upserted {} records into {}", records.len(), name);
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        name: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(name) else {
            return Err(RagError::Store(format!("Collection {} does not exist", name)));
        };

        let results = match query {
            SearchQuery::Semantic { vector, min_score } => {
                let mut hits: Vec<(f32, &VectorRecord)> = collection
                    .records
                    .iter()
                    .map(|record| (cosine_similarity(vector, &record.vector), record))
                    .filter(|(score, _)| score >= min_score)
                    .collect();
                hits.sort_by(|a, b| b.0.total_cmp(&a.0));
                hits.into_iter()
                    .take(limit)
                    .map(|(score, record)| scored(record, Some(score)))
                    .collect()
            }
            SearchQuery::Keyword(keywords) => {
                if keywords.is_empty() {
                    return Ok(Vec::new());
                }
                collection
                    .records
                    .iter()
                    .filter(|record| keywords.matches(&record.content))
                    .take(limit)
                    .map(|record| scored(record, None))
                    .collect()
            }
        };

        Ok(results)
    }

    #[inline]
    async fn reset(&self, name: &str, dimensions: usize, distance: Distance) -> Result<()> {
        self.collections.write().await.remove(name);
        info!("Dropped in-memory collection {}", name);
        self.ensure_collection(name, dimensions, distance).await
    }

    #[inline]
    async fn stats(&self, name: &str) -> Result<CollectionStats> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(name)
            .map_or_else(
                || CollectionStats::missing(name),
                |collection| CollectionStats {
                    name: name.to_string(),
                    exists: true,
                    count: collection.records.len() as u64,
                    dimensions: Some(collection.dimensions),
                    embedding_model: None,
                },
            ))
    }
}

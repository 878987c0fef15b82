
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    CollectionStats, Distance, KeywordSet, ScoredRecord, SearchQuery, VectorRecord, VectorStore,
};
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const CONTENT_FIELD: &str = "content";
const UNKNOWN_DOCUMENT: &str = "Unbekanntes Dokument";

/// Qdrant over its REST API
#[derive(Debug, Clone)]
pub struct QdrantStore {
    base_url: Url,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Debug, Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrolledPoint>,
}

#[derive(Debug, Deserialize)]
struct ScrolledPoint {
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointPayload {
    #[serde(default)]
    content: String,
    #[serde(default = "unknown_document")]
    document_name: String,
    #[serde(default = "first_page")]
    page_number: u32,
    #[serde(default)]
    source_path: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

fn unknown_document() -> String {
    UNKNOWN_DOCUMENT.to_string()
}

const fn first_page() -> u32 {
    1
}

impl PointPayload {
    fn into_scored(self, score: Option<f32>) -> ScoredRecord {
        ScoredRecord {
            content: self.content,
            document_name: self.document_name,
            page_number: self.page_number,
            score,
        }
    }
}

enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl QdrantStore {
    #[inline]
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(url).with_context(|| format!("Invalid Qdrant URL: {}", url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self { base_url, agent })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> anyhow::Result<T> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build Qdrant URL for {}", path))?;
        let payload = body.map(Value::to_string).unwrap_or_default();

        debug!("Qdrant request {}", url);

        let response = match method {
            Method::Get => self.agent.get(url.as_str()).call(),
            Method::Delete => self.agent.delete(url.as_str()).call(),
            Method::Put => self
                .agent
                .put(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload),
            Method::Post => self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload),
        };

        let text = response
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => anyhow!("Qdrant returned HTTP {} for {}", status, url),
                other => anyhow!("Qdrant request to {} failed: {}", url, other),
            })?;

        let parsed: QdrantResponse<T> = serde_json::from_str(&text)
            .with_context(|| format!("Unexpected Qdrant response from {}", url))?;
        Ok(parsed.result)
    }

    fn list_collections_blocking(&self) -> anyhow::Result<Vec<String>> {
        let list: CollectionList = self.call(&Method::Get, "collections", None)?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    fn exists_blocking(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self
            .list_collections_blocking()?
            .iter()
            .any(|collection| collection == name))
    }

    fn dimensions_blocking(&self, name: &str) -> anyhow::Result<Option<usize>> {
        let info: Value = self.call(&Method::Get, &collection_path(name, ""), None)?;
        Ok(info
            .pointer("/config/params/vectors/size")
            .and_then(Value::as_u64)
            .and_then(|size| usize::try_from(size).ok()))
    }

    fn create_blocking(&self, name: &str, dimensions: usize, distance: Distance) -> anyhow::Result<()> {
        info!("Creating Qdrant collection {} ({} dimensions)", name, dimensions);

        let _: Value = self.call(
            &Method::Put,
            &collection_path(name, ""),
            Some(&json!({
                "vectors": { "size": dimensions, "distance": distance.to_string() },
                "optimizers_config": { "default_segment_number": 2 },
                "replication_factor": 1
            })),
        )?;

        let _: Value = self
            .call(
                &Method::Put,
                &collection_path(name, "/index?wait=true"),
                Some(&json!({ "field_name": CONTENT_FIELD, "field_schema": "text" })),
            )
            .context("Failed to create full-text index on content")?;

        Ok(())
    }

    fn delete_blocking(&self, name: &str) -> anyhow::Result<()> {
        let _: Value = self.call(&Method::Delete, &collection_path(name, ""), None)?;
        info!("Deleted Qdrant collection {}", name);
        Ok(())
    }

    fn keyword_filter(keywords: &KeywordSet) -> Value {
        let should: Vec<Value> = keywords
            .words()
            .iter()
            .map(|word| json!({ "key": CONTENT_FIELD, "match": { "text": word } }))
            .collect();
        json!({ "must": [ { "should": should } ] })
    }

    /// Run a blocking REST exchange off the async runtime
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(RagError::store)?
            .map_err(RagError::store)
    }
}

fn collection_path(name: &str, suffix: &str) -> String {
    format!("collections/{}{}", name, suffix)
}

#[async_trait]
impl VectorStore for QdrantStore {
    #[inline]
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    #[inline]
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.run(Self::list_collections_blocking).await
    }

    #[inline]
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<()> {
        let owned = name.to_string();
        let existing = self
            .run(move |store| {
                if store.exists_blocking(&owned)? {
                    Ok(Some(store.dimensions_blocking(&owned)?))
                } else {
                    store.create_blocking(&owned, dimensions, distance)?;
                    Ok(None)
                }
            })
            .await?;

        match existing {
            Some(Some(actual)) if actual != dimensions => Err(RagError::Configuration(format!(
                "Collection {} has {} dimensions but {} were requested; reset it to switch embedding models",
                name, actual, dimensions
            ))),
            Some(None) => {
                warn!("Could not read dimensionality of collection {}", name);
                Ok(())
            }
            Some(Some(_)) => {
                debug!("Collection {} already exists", name);
                Ok(())
            }
            None => Ok(()),
        }
    }

    #[inline]
    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "vector": record.vector,
                    "payload": PointPayload {
                        content: record.content.clone(),
                        document_name: record.document_name.clone(),
                        page_number: record.page_number,
                        source_path: record.source_path.clone(),
                        created_at: Some(record.created_at.to_rfc3339()),
                    },
                })
            })
            .collect();
        let body = json!({ "points": points });
        let path = collection_path(name, "/points?wait=true");
        let count = records.len();

        self.run(move |store| {
            let _: Value = store.call(&Method::Put, &path, Some(&body))?;
            Ok(())
        })
        .await?;

        debug!("Upserted {} points into {}", count, name);
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        name: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        match query {
            SearchQuery::Semantic { vector, min_score } => {
                let body = json!({
                    "vector": vector,
                    "limit": limit,
                    "score_threshold": min_score,
                    "with_payload": true,
                });
                let path = collection_path(name, "/points/search");
                let points: Vec<ScoredPoint> = self
                    .run(move |store| store.call(&Method::Post, &path, Some(&body)))
                    .await?;

                Ok(points
                    .into_iter()
                    .filter_map(|point| {
                        let score = point.score;
                        point.payload.map(|payload| payload.into_scored(Some(score)))
                    })
                    .collect())
            }
            SearchQuery::Keyword(keywords) => {
                if keywords.is_empty() {
                    warn!("No usable keywords in query");
                    return Ok(Vec::new());
                }

                let body = json!({
                    "filter": Self::keyword_filter(keywords),
                    "limit": limit,
                    "with_payload": true,
                    "with_vector": false,
                });
                let path = collection_path(name, "/points/scroll");
                let scrolled: ScrollResult = self
                    .run(move |store| store.call(&Method::Post, &path, Some(&body)))
                    .await?;

                Ok(scrolled
                    .points
                    .into_iter()
                    .filter_map(|point| point.payload.map(|payload| payload.into_scored(None)))
                    .collect())
            }
        }
    }

    #[inline]
    async fn reset(&self, name: &str, dimensions: usize, distance: Distance) -> Result<()> {
        let owned = name.to_string();
        self.run(move |store| {
            if store.exists_blocking(&owned)? {
                store.delete_blocking(&owned)?;
            }
            store.create_blocking(&owned, dimensions, distance)
        })
        .await
    }

    #[inline]
    async fn stats(&self, name: &str) -> Result<CollectionStats> {
        let owned = name.to_string();
        self.run(move |store| {
            if !store.exists_blocking(&owned)? {
                return Ok(CollectionStats::missing(&owned));
            }

            let dimensions = store.dimensions_blocking(&owned)?;
            let counted: CountResult = store.call(
                &Method::Post,
                &collection_path(&owned, "/points/count"),
                Some(&json!({ "exact": true })),
            )?;

            Ok(CollectionStats {
                name: owned,
                exists: true,
                count: counted.count,
                dimensions,
                embedding_model: None,
            })
        })
        .await
    }
}

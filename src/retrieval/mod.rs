// Retrieval and context assembly for the online query path


use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::{KeywordSet, ScoredRecord, SearchQuery, VectorStore};
use crate::embeddings::{Embedder, estimate_token_count};

/// Appended to excerpts cut down to the per-result cap
pub const TRUNCATION_MARKER: &str = "... [Dokument gekürzt wegen Größe]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Estimated tokens allowed across all included excerpts
    pub token_budget: usize,
    /// Estimated tokens above which one excerpt is truncated
    pub per_result_token_cap: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            token_budget: 10_000,
            per_result_token_cap: 2_000,
        }
    }
}

/// Which search produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    /// Degraded keyword match, used when no embedding is available
    Keyword,
    /// Nothing was searched: the collection is missing or the store failed
    None,
}

/// One retrieved passage as it was placed into the context block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExcerpt {
    pub document_name: String,
    pub page_number: u32,
    pub content: String,
    pub score: Option<f32>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub context_text: String,
    pub documents: Vec<DocumentExcerpt>,
    pub estimated_tokens: usize,
    pub mode: SearchMode,
}

impl RetrievalResult {
    #[inline]
    pub fn empty() -> Self {
        Self {
            context_text: String::new(),
            documents: Vec::new(),
            estimated_tokens: 0,
            mode: SearchMode::None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Fit ranked candidates into the token budget and render the context block.
///
/// Candidates are taken in the given order until the next one would push the
/// running estimate over the budget. Oversized candidates are cut to the
/// per-result cap; the budget is charged with their full estimate.
#[inline]
pub fn assemble_context(
    candidates: Vec<ScoredRecord>,
    config: &RetrievalConfig,
    mode: SearchMode,
) -> RetrievalResult {
    let mut context_text = String::new();
    let mut documents = Vec::new();
    let mut estimated_tokens = 0;

    for candidate in candidates {
        let tokens = estimate_token_count(&candidate.content);

        if estimated_tokens + tokens > config.token_budget {
            warn!("Token budget reached, dropping remaining documents");
            break;
        }

        let truncated = tokens > config.per_result_token_cap;
        let content = if truncated {
            warn!("Truncating oversized excerpt from {}", candidate.document_name);
            let limit = config.per_result_token_cap * 4;
            let mut cut: String = candidate.content.chars().take(limit).collect();
            cut.push_str(TRUNCATION_MARKER);
            cut
        } else {
            candidate.content
        };

        let _ = write!(
            context_text,
            "Dokument: {}\nSeite: {}\nInhalt: {}\n\n",
            candidate.document_name, candidate.page_number, content
        );

        estimated_tokens += tokens;
        documents.push(DocumentExcerpt {
            document_name: candidate.document_name,
            page_number: candidate.page_number,
            content,
            score: candidate.score,
            truncated,
        });
    }

    debug!("Estimated context size: {} tokens", estimated_tokens);

    RetrievalResult {
        context_text,
        documents,
        estimated_tokens,
        mode,
    }
}

/// Looks up passages for a query and turns them into a context block
pub struct ContextBuilder {
    store: Arc<dyn VectorStore>,
    embedder: Option<Arc<dyn Embedder>>,
    collection: String,
    search_limit: usize,
    min_score: f32,
    config: RetrievalConfig,
}

impl ContextBuilder {
    #[inline]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Option<Arc<dyn Embedder>>,
        collection: impl Into<String>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
            search_limit: 10,
            min_score: 0.2,
            config,
        }
    }

    #[inline]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    #[inline]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Build the context block for `query`.
    ///
    /// Never fails: a missing collection or a store error yields an empty result.
    #[inline]
    pub async fn build_context(&self, query: &str) -> RetrievalResult {
        self.build_context_with_limit(query, self.search_limit).await
    }

    #[inline]
    pub async fn build_context_with_limit(&self, query: &str, limit: usize) -> RetrievalResult {
        match self.store.collection_exists(&self.collection).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Collection {} does not exist, index documents first",
                    self.collection
                );
                return RetrievalResult::empty();
            }
            Err(e) => {
                warn!("Could not check collection {}: {}", self.collection, e);
                return RetrievalResult::empty();
            }
        }

        match self.search(query, limit).await {
            Ok((candidates, mode)) => {
                info!("{} candidates found ({:?} search)", candidates.len(), mode);
                assemble_context(candidates, &self.config, mode)
            }
            Err(e) => {
                warn!("Search in {} failed: {}", self.collection, e);
                RetrievalResult::empty()
            }
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<(Vec<ScoredRecord>, SearchMode)> {
        if let Some(embedder) = &self.embedder {
            match embedder.embed(query).await {
                Ok(vector) => {
                    let semantic = SearchQuery::Semantic {
                        vector,
                        min_score: self.min_score,
                    };
                    let results = self.store.search(&self.collection, &semantic, limit).await?;
                    return Ok((results, SearchMode::Semantic));
                }
                Err(e) => warn!("Query embedding failed, falling back to keyword search: {}", e),
            }
        }

        let keywords = SearchQuery::Keyword(KeywordSet::parse(query));
        let results = self.store.search(&self.collection, &keywords, limit).await?;
        Ok((results, SearchMode::Keyword))
    }
}

// Embedded LanceDB backend: one table per collection under the data directory


use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    CollectionStats, Distance, KeywordSet, ScoredRecord, SearchQuery, VectorRecord, VectorStore,
};
use crate::{RagError, Result};

/// Vector store backed by a local LanceDB directory
pub struct LanceDbStore {
    connection: Connection,
}

impl LanceDbStore {
    /// Open (or create) the database directory at `path`
    #[inline]
    pub async fn new(path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Store(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("LanceDB store opened at {}", path.display());
        Ok(Self { connection })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to list tables: {}", e)))
    }

    async fn open(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table {}: {}", name, e)))
    }

    /// Vector width recorded in the table schema
    async fn table_dimensions(table: &Table) -> Result<Option<usize>> {
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Store(format!("Failed to get table schema: {}", e)))?;

        Ok(schema.fields().iter().find_map(|field| {
            if field.name() != "vector" {
                return None;
            }
            match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            }
        }))
    }

    fn create_schema(vector_dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("document_name", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, false),
            Field::new("source_path", DataType::Utf8, true),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn create_table(&self, name: &str, dimensions: usize) -> Result<()> {
        let width = vector_width(dimensions)?;
        self.connection
            .create_empty_table(name, Self::create_schema(width))
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to create table {}: {}", name, e)))?;

        info!("Created LanceDB table {} with {} dimensions", name, dimensions);
        Ok(())
    }

    fn create_record_batch(records: &[VectorRecord], vector_dim: usize) -> Result<RecordBatch> {
        let width = vector_width(vector_dim)?;

        let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
        for record in records {
            if record.vector.len() != vector_dim {
                return Err(RagError::Store(format!(
                    "Record {} has {} dimensions, table expects {}",
                    record.id,
                    record.vector.len(),
                    vector_dim
                )));
            }
            flat_values.extend_from_slice(&record.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, width, Arc::new(Float32Array::from(flat_values)), None)
                .map_err(|e| RagError::Store(format!("Failed to create vector array: {}", e)))?;

        let created_ats: Vec<String> = records.iter().map(|r| r.created_at.to_rfc3339()).collect();

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.content.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.document_name.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.page_number),
            )),
            Arc::new(StringArray::from(
                records
                    .iter()
                    .map(|r| r.source_path.as_deref())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from_iter_values(created_ats.iter().map(String::as_str))),
        ];

        RecordBatch::try_new(Self::create_schema(width), arrays)
            .map_err(|e| RagError::Store(format!("Failed to create record batch: {}", e)))
    }

    async fn collect_results(
        mut results: lancedb::arrow::SendableRecordBatchStream,
        scored: bool,
    ) -> Result<Vec<ScoredRecord>> {
        let mut records = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read result stream: {}", e)))?
        {
            records.extend(Self::parse_batch(&batch, scored)?);
        }

        Ok(records)
    }

    fn parse_batch(batch: &RecordBatch, scored: bool) -> Result<Vec<ScoredRecord>> {
        let contents = string_column(batch, "content")?;
        let document_names = string_column(batch, "document_name")?;
        let page_numbers = batch
            .column_by_name("page_number")
            .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
            .ok_or_else(|| RagError::Store("Missing or invalid page_number column".to_string()))?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        Ok((0..batch.num_rows())
            .map(|row| {
                let score = scored.then(|| {
                    let distance = distances
                        .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                    1.0 - distance
                });
                ScoredRecord {
                    content: contents.value(row).to_string(),
                    document_name: document_names.value(row).to_string(),
                    page_number: page_numbers.value(row),
                    score,
                }
            })
            .collect())
    }
}

fn vector_width(dimensions: usize) -> Result<i32> {
    i32::try_from(dimensions)
        .map_err(|_| RagError::Configuration(format!("Vector dimension {} is too large", dimensions)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RagError::Store(format!("Missing or invalid {} column", name)))
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape `LIKE` wildcards so query words match literally
fn like_escape(word: &str) -> String {
    let mut escaped = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn keyword_predicate(keywords: &KeywordSet) -> String {
    keywords
        .words()
        .iter()
        .map(|word| {
            format!(
                "content LIKE {} ESCAPE '\\'",
                sql_literal(&format!("%{}%", like_escape(word)))
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl VectorStore for LanceDbStore {
    #[inline]
    fn backend_name(&self) -> &'static str {
        "lancedb"
    }

    #[inline]
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.table_names().await
    }

    #[inline]
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        distance: Distance,
    ) -> Result<()> {
        if !self.table_names().await?.iter().any(|t| t == name) {
            debug!("Creating table {} ({})", name, distance);
            return self.create_table(name, dimensions).await;
        }

        let table = self.open(name).await?;
        match Self::table_dimensions(&table).await? {
            Some(existing) if existing != dimensions => Err(RagError::Configuration(format!(
                "Collection {} has {} dimensions but {} were requested; reset it to switch embedding models",
                name, existing, dimensions
            ))),
            _ => {
                debug!("Table {} already exists", name);
                Ok(())
            }
        }
    }

    #[inline]
    async fn upsert_batch(&self, name: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let table = self.open(name).await?;
        let dimensions = Self::table_dimensions(&table)
            .await?
            .ok_or_else(|| RagError::Store(format!("Table {} has no vector column", name)))?;
        let batch = Self::create_record_batch(records, dimensions)?;

        let ids = records
            .iter()
            .map(|r| sql_literal(&r.id))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({})", ids))
            .await
            .map_err(|e| RagError::Store(format!("Failed to replace existing records: {}", e)))?;

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to insert records: {}", e)))?;

        debug!("Stored {} records in {}", records.len(), name);
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        name: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let table = self.open(name).await?;

        match query {
            SearchQuery::Semantic { vector, min_score } => {
                let stream = table
                    .vector_search(vector.as_slice())
                    .map_err(|e| RagError::Store(format!("Failed to create vector search: {}", e)))?
                    .column("vector")
                    .distance_type(DistanceType::Cosine)
                    .limit(limit)
                    .execute()
                    .await
                    .map_err(|e| RagError::Store(format!("Failed to execute search: {}", e)))?;

                let mut results = Self::collect_results(stream, true).await?;
                results.retain(|r| r.score.is_some_and(|score| score >= *min_score));
                Ok(results)
            }
            SearchQuery::Keyword(keywords) => {
                if keywords.is_empty() {
                    return Ok(Vec::new());
                }

                let stream = table
                    .query()
                    .only_if(keyword_predicate(keywords))
                    .limit(limit)
                    .execute()
                    .await
                    .map_err(|e| RagError::Store(format!("Failed to execute keyword query: {}", e)))?;

                Self::collect_results(stream, false).await
            }
        }
    }

    #[inline]
    async fn reset(&self, name: &str, dimensions: usize, distance: Distance) -> Result<()> {
        if self.table_names().await?.iter().any(|t| t == name) {
            info!("Dropping table {}", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| RagError::Store(format!("Failed to drop table: {}", e)))?;
        }
        self.ensure_collection(name, dimensions, distance).await
    }

    #[inline]
    async fn stats(&self, name: &str) -> Result<CollectionStats> {
        if !self.table_names().await?.iter().any(|t| t == name) {
            return Ok(CollectionStats::missing(name));
        }

        let table = self.open(name).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(CollectionStats {
            name: name.to_string(),
            exists: true,
            count: count as u64,
            dimensions: Self::table_dimensions(&table).await?,
            embedding_model: None,
        })
    }
}

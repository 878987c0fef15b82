use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::RagContext;
use crate::database::Distance;
use crate::embeddings::OllamaClient;
use crate::retrieval::SearchMode;

/// Index the documents directory into the configured collection
#[inline]
pub async fn index_documents(context: &RagContext, dir: Option<PathBuf>, reset: bool) -> Result<()> {
    let dir = dir.unwrap_or_else(|| context.config().documents.dir.clone());
    let indexer = context.indexer()?;

    if reset {
        indexer.reset().await.context("Failed to reset collection")?;
        println!("Collection {} reset", context.collection());
    }

    let stats = indexer
        .index(&dir)
        .await
        .with_context(|| format!("Indexing {} failed", dir.display()))?;

    println!("📂 Indexed {}", dir.display());
    println!("   Documents found:   {}", stats.documents_found);
    println!("   Documents indexed: {}", stats.documents_indexed);
    if stats.documents_skipped > 0 {
        println!("   Skipped (no text): {}", stats.documents_skipped);
    }
    if stats.documents_failed > 0 {
        println!("   Failed:            {}", stats.documents_failed);
    }
    println!("   Chunks created:    {}", stats.chunks_created);
    println!("   Records stored:    {}", stats.records_stored);

    if stats.documents_found == 0 {
        println!();
        println!(
            "Place PDF, DOCX, TXT, MD or HTML files in {} and run 'docs-rag index' again.",
            dir.display()
        );
    }

    Ok(())
}

/// Print the context that would be sent to the model for `query`
#[inline]
pub async fn search_documents(context: &RagContext, query: &str, limit: Option<usize>) -> Result<()> {
    let builder = context.context_builder();
    let limit = limit.unwrap_or(context.config().vector_store.search_limit);
    let result = builder.build_context_with_limit(query, limit).await;

    match result.mode {
        SearchMode::None => {
            println!(
                "No searchable collection named {}. Run 'docs-rag index' first.",
                context.collection()
            );
            return Ok(());
        }
        SearchMode::Keyword => println!("⚠️  Keyword search (embeddings unavailable)"),
        SearchMode::Semantic => {}
    }

    if result.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!(
        "Found {} results (~{} tokens) for: {}",
        result.documents.len(),
        result.estimated_tokens,
        query
    );
    println!();

    for (rank, excerpt) in result.documents.iter().enumerate() {
        let score = excerpt
            .score
            .map_or_else(|| "-".to_string(), |score| format!("{:.3}", score));
        println!(
            "{}. {} (Seite {}) score {}",
            rank + 1,
            excerpt.document_name,
            excerpt.page_number,
            score
        );
        let preview: String = excerpt.content.chars().take(300).collect();
        println!("   {}", preview.replace('\n', " "));
        println!();
    }

    Ok(())
}

/// Answer one question and print the reply with its sources
#[inline]
pub async fn ask_question(context: &RagContext, question: &str) -> Result<()> {
    let reply = context
        .chat_service()
        .answer(question)
        .await
        .context("Failed to answer question")?;

    println!("{}", reply.reply);

    if !reply.sources.is_empty() {
        println!();
        println!("Quellen:");
        for source in &reply.sources {
            println!("  - {}, Seite {}", source.document, source.page);
        }
    }

    Ok(())
}

/// Run the HTTP server until interrupted
#[inline]
pub async fn serve_http(context: RagContext, port: Option<u16>) -> Result<()> {
    let server = &context.config().server;
    let host: IpAddr = server
        .host
        .parse()
        .with_context(|| format!("Invalid server host: {}", server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(server.port));

    crate::server::serve(Arc::new(context), addr).await
}

/// Drop and recreate the collection
#[inline]
pub async fn reset_collection(context: &RagContext) -> Result<()> {
    let dimension = context
        .embedder()
        .map_or(context.config().embedding.dimension as usize, |embedder| {
            embedder.dimension()
        });

    warn!("Resetting collection {}", context.collection());
    context
        .store()
        .reset(context.collection(), dimension, Distance::Cosine)
        .await
        .context("Failed to reset collection")?;

    println!(
        "Collection {} reset ({} dimensions)",
        context.collection(),
        dimension
    );
    Ok(())
}

/// Show connectivity and collection status
#[inline]
pub async fn show_status(context: &RagContext) -> Result<()> {
    let config = context.config();

    println!("📊 docs-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Store ({}):", context.store().backend_name());
    match context.stats().await {
        Ok(stats) if stats.exists => {
            println!("   ✅ Collection: {}", stats.name);
            println!("   📄 Records: {}", stats.count);
            if let Some(dimensions) = stats.dimensions {
                println!("   🔢 Dimensions: {}", dimensions);
            }
        }
        Ok(stats) => {
            println!("   ⚠️  Collection {} does not exist yet", stats.name);
        }
        Err(e) => {
            println!("   ❌ Unreachable - {}", e);
        }
    }
    println!();

    println!("🧮 Embeddings:");
    if config.embedding.enabled {
        let embedding = config.embedding.clone();
        let health = tokio::task::spawn_blocking(move || {
            OllamaClient::new(&embedding).and_then(|client| client.health_check())
        })
        .await
        .context("Health check task failed")?;

        match health {
            Ok(()) => println!(
                "   ✅ {} at {}:{}",
                config.embedding.model, config.embedding.host, config.embedding.port
            ),
            Err(e) => println!("   ❌ {} - {:#}", config.embedding.model, e),
        }
    } else {
        println!("   ⚠️  Disabled, retrieval uses keyword search");
    }
    println!();

    println!("🤖 Chat Model:");
    match context.chat().list_models().await {
        Ok(models) => {
            let model = context.chat().model_name();
            let available = models
                .iter()
                .any(|name| name == model || name.split(':').next() == Some(model));
            if available {
                println!("   ✅ {} at {}:{}", model, config.llm.host, config.llm.port);
            } else {
                println!(
                    "   ⚠️  {} not installed; available: {}",
                    model,
                    models.join(", ")
                );
            }
        }
        Err(e) => {
            println!("   ❌ Ollama unreachable - {}", e);
        }
    }

    info!("Status report complete");
    Ok(())
}

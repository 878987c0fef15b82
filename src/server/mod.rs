// HTTP surface for the chat frontend


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::chat::ChatService;
use crate::context::RagContext;

const DEFAULT_TEST_QUERY: &str = "test query";
const PREVIEW_CHARS: usize = 200;

#[derive(Clone)]
pub struct AppState {
    context: Arc<RagContext>,
    chat: Arc<ChatService>,
}

impl AppState {
    #[inline]
    pub fn new(context: Arc<RagContext>) -> Self {
        let chat = Arc::new(context.chat_service());
        Self { context, chat }
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TestSearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestSearchResponse {
    query: String,
    document_count: usize,
    documents: Vec<DocumentPreview>,
}

#[derive(Debug, Serialize)]
struct DocumentPreview {
    name: String,
    page: u32,
    preview: String,
}

fn error_response(status: StatusCode, error: &str, details: impl std::fmt::Display) -> Response {
    (
        status,
        Json(json!({ "error": error, "details": details.to_string() })),
    )
        .into_response()
}

fn unreachable_response(message: &str, details: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "status": "error",
            "message": message,
            "details": details.to_string(),
        })),
    )
        .into_response()
}

/// Build the application router
#[inline]
pub fn router(context: Arc<RagContext>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/test-search", get(test_search_handler))
        .route("/api/check-ollama", get(check_ollama_handler))
        .route("/api/check-qdrant", get(check_store_handler))
        .route("/api/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(context))
}

/// Serve until Ctrl-C
#[inline]
pub async fn serve(context: Arc<RagContext>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on http://{}", addr);
    info!(
        "Using collection {} with chat model {}",
        context.collection(),
        context.chat().model_name()
    );

    axum::serve(listener, router(context))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

async fn chat_handler(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let message = request.message.trim();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message is required" })),
        )
            .into_response();
    }

    match state.chat.answer(message).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            error!("Chat request failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Fehler bei der Antwort vom lokalen LLM",
                e,
            )
        }
    }
}

async fn test_search_handler(
    State(state): State<AppState>,
    Query(params): Query<TestSearchParams>,
) -> Json<TestSearchResponse> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_QUERY.to_string());

    let result = state.chat.retriever().build_context(&query).await;

    let documents: Vec<DocumentPreview> = result
        .documents
        .into_iter()
        .map(|excerpt| DocumentPreview {
            name: excerpt.document_name,
            page: excerpt.page_number,
            preview: format!(
                "{}...",
                excerpt.content.chars().take(PREVIEW_CHARS).collect::<String>()
            ),
        })
        .collect();

    Json(TestSearchResponse {
        query,
        document_count: documents.len(),
        documents,
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

async fn check_ollama_handler(State(state): State<AppState>) -> Response {
    let chat = state.context.chat();
    match chat.list_models().await {
        Ok(models) => Json(json!({
            "status": "ok",
            "models": models,
            "recommended": chat.model_name(),
        }))
        .into_response(),
        Err(e) => {
            error!("Ollama check failed: {}", e);
            unreachable_response(
                "Ollama ist nicht erreichbar. Bitte stellen Sie sicher, dass Ollama läuft.",
                e,
            )
        }
    }
}

async fn check_store_handler(State(state): State<AppState>) -> Response {
    let collection = state.context.collection();
    match state.context.store().list_collections().await {
        Ok(names) => {
            let collection_exists = names.iter().any(|name| name == collection);
            Json(json!({
                "status": "ok",
                "collections": names,
                "currentCollection": collection,
                "collectionExists": collection_exists,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Vector store check failed: {}", e);
            unreachable_response(
                "Qdrant ist nicht erreichbar. Bitte stellen Sie sicher, dass Qdrant läuft.",
                e,
            )
        }
    }
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    match state.context.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!("Stats request failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error reading collection stats",
                e,
            )
        }
    }
}

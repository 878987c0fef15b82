use super::*;
use crate::RagError;
use crate::database::{Distance, MemoryStore, VectorRecord, VectorStore};
use crate::embeddings::Embedder;
use crate::llm::AnswerSynthesizer;
use crate::retrieval::RetrievalConfig;
use crate::test_support::{HashingEmbedder, ScriptedChat, TEST_DIMENSION};
use chrono::Utc;
use std::sync::Arc;

const COLLECTION: &str = "knowledge-collection";
const PASSAGE: &str = "Die Hauptpumpe wird jedes Jahr im März gewartet.";

async fn indexed_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .ensure_collection(COLLECTION, TEST_DIMENSION, Distance::Cosine)
        .await
        .expect("should create collection");

    let vector = HashingEmbedder
        .embed(PASSAGE)
        .await
        .expect("should embed");
    store
        .upsert(
            COLLECTION,
            &[VectorRecord {
                id: "00000000-0000-0000-0000-000000000001".to_string(),
                vector,
                content: PASSAGE.to_string(),
                document_name: "wartung.pdf".to_string(),
                page_number: 2,
                source_path: None,
                created_at: Utc::now(),
            }],
        )
        .await
        .expect("should upsert");
    store
}

fn service(store: MemoryStore, chat: Arc<ScriptedChat>) -> ChatService {
    let retriever = ContextBuilder::new(
        Arc::new(store),
        Some(Arc::new(HashingEmbedder)),
        COLLECTION,
        RetrievalConfig::default(),
    );
    ChatService::new(retriever, AnswerSynthesizer::new(chat))
}

#[tokio::test]
async fn answers_from_documents_with_sources() {
    let chat = Arc::new(ScriptedChat::replying(
        "Die Pumpe wird im März gewartet (Quelle: wartung.pdf, Seite 2).",
    ));
    let service = service(indexed_store().await, Arc::clone(&chat));

    let reply = service
        .answer("Wann wird die Hauptpumpe gewartet?")
        .await
        .expect("should answer");

    assert_eq!(reply.retrieval_mode, SearchMode::Semantic);
    assert_eq!(reply.excerpts_used, 1);
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(reply.sources[0].document, "wartung.pdf");
    assert_eq!(reply.sources[0].page, 2);

    let prompt = chat.last_user_prompt().expect("a prompt was sent");
    assert!(prompt.contains("Dokument: wartung.pdf\nSeite: 2\nInhalt: Die Hauptpumpe"));
}

#[tokio::test]
async fn unindexed_collection_falls_back_to_general_knowledge() {
    let chat = Arc::new(ScriptedChat::replying("[Allgemeinwissen]: Pumpen brauchen Wartung."));
    let service = service(MemoryStore::new(), Arc::clone(&chat));

    let reply = service
        .answer("Wann wird die Pumpe gewartet?")
        .await
        .expect("should answer");

    assert_eq!(reply.retrieval_mode, SearchMode::None);
    assert_eq!(reply.excerpts_used, 0);
    assert!(reply.sources.is_empty());

    let prompt = chat.last_user_prompt().expect("a prompt was sent");
    assert!(prompt.contains("keine relevanten Informationen"));
}

#[tokio::test]
async fn model_failure_is_an_error() {
    let chat = Arc::new(ScriptedChat::failing("connection refused"));
    let service = service(indexed_store().await, chat);

    let result = service.answer("Wann wird die Hauptpumpe gewartet?").await;
    assert!(matches!(result, Err(RagError::Synthesis(_))));
}

#[test]
fn reply_serializes_reply_and_sources_only() {
    let reply = ChatReply {
        reply: "Text".to_string(),
        sources: Vec::new(),
        retrieval_mode: SearchMode::Keyword,
        excerpts_used: 3,
    };

    let json = serde_json::to_value(&reply).expect("should serialize");
    assert_eq!(json, serde_json::json!({"reply": "Text", "sources": []}));
}

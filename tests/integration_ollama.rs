#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama embedding and chat exchanges against a mock server

use docs_rag::RagError;
use docs_rag::embeddings::{Embedder, OllamaClient, OllamaEmbedder};
use docs_rag::llm::{AnswerSynthesizer, ChatBackend, ChatMessage, GenerationOptions, OllamaChat};
use serde_json::json;
use std::sync::Arc;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, model: &str) -> OllamaClient {
    let url = Url::parse(&server.uri()).expect("mock server URI should be valid");
    OllamaClient::from_url(url, model).with_retry_attempts(1)
}

async fn mount_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "nomic-embed-text:latest", "size": 274302450, "digest": "0a109f422b47" },
                { "name": "mistral:latest", "size": 4113301824u64,
                  "details": { "family": "llama", "parameter_size": "7.2B", "quantization_level": "Q4_0" } }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn embeddings_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text", "input": "Pumpe" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[3.0, 4.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::with_client(client_for(&server, "nomic-embed-text"), 2);
    let vector = embedder.embed("Pumpe").await.expect("should embed");

    assert_eq!(vector.len(), 2);
    assert!((vector[0] - 0.6).abs() < 1e-6);
    assert!((vector[1] - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn unexpected_dimension_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::with_client(client_for(&server, "nomic-embed-text"), 768);
    let result = embedder.embed("Pumpe").await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "model not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse(&server.uri()).expect("mock server URI should be valid");
    let client = OllamaClient::from_url(url, "missing-model").with_retry_attempts(3);
    let embedder = OllamaEmbedder::with_client(client, 768);

    assert!(embedder.embed("Pumpe").await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_finds_model_without_tag() {
    let server = MockServer::start().await;
    mount_tags(&server).await;

    let client = client_for(&server, "nomic-embed-text");
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should finish");
    assert!(result.is_ok(), "health check failed: {:?}", result);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_reports_missing_model() {
    let server = MockServer::start().await;
    mount_tags(&server).await;

    let client = client_for(&server, "llama3");
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should finish");
    assert!(result.is_err());
}

#[tokio::test]
async fn chat_sends_options_and_reads_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "mistral",
            "stream": false,
            "messages": [
                { "role": "system", "content": "Nur Deutsch." },
                { "role": "user", "content": "Hallo?" }
            ],
            "options": { "num_predict": 512 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral",
            "created_at": "2024-05-01T10:00:00Z",
            "message": { "role": "assistant", "content": "Guten Tag (Quelle: a.pdf, Seite 1)" },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::with_client(client_for(&server, "mistral"));
    let reply = chat
        .complete(
            &[ChatMessage::system("Nur Deutsch."), ChatMessage::user("Hallo?")],
            GenerationOptions {
                temperature: 0.1,
                max_tokens: 512,
            },
        )
        .await
        .expect("should complete");

    assert_eq!(reply, "Guten Tag (Quelle: a.pdf, Seite 1)");
}

#[tokio::test]
async fn chat_failure_is_a_synthesis_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let synthesizer =
        AnswerSynthesizer::new(Arc::new(OllamaChat::with_client(client_for(&server, "mistral"))));
    let result = synthesizer.synthesize("Hallo?", "").await;

    assert!(matches!(result, Err(RagError::Synthesis(_))));
}

#[tokio::test]
async fn chat_lists_installed_models() {
    let server = MockServer::start().await;
    mount_tags(&server).await;

    let chat = OllamaChat::with_client(client_for(&server, "mistral"));
    let models = chat.list_models().await.expect("should list models");

    assert_eq!(models, vec!["nomic-embed-text:latest", "mistral:latest"]);
}

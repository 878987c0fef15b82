use super::*;

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        ..EmbeddingConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&EmbeddingConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn rejects_invalid_endpoint() {
    let config = EmbeddingConfig {
        protocol: "gopher".to_string(),
        ..EmbeddingConfig::default()
    };
    assert!(OllamaClient::new(&config).is_err());
}

#[test]
fn model_name_matching_accepts_tags() {
    let info = ModelInfo {
        name: "nomic-embed-text:latest".to_string(),
        size: None,
        digest: None,
        details: None,
    };

    assert!(info.matches("nomic-embed-text:latest"));
    assert!(info.matches("nomic-embed-text"));
    assert!(!info.matches("nomic-embed"));
    assert!(!info.matches("mistral"));
}

#[test]
fn embedder_reports_configured_dimension() {
    let config = EmbeddingConfig {
        dimension: 384,
        model: "all-minilm".to_string(),
        ..EmbeddingConfig::default()
    };
    let embedder = OllamaEmbedder::new(&config).expect("Failed to create embedder");

    assert_eq!(embedder.dimension(), 384);
    assert_eq!(embedder.model_name(), "all-minilm");
}

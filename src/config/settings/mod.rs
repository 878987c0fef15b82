
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;
use crate::indexer::{IdPolicy, IndexingConfig};
use crate::llm::DEFAULT_SYSTEM_PROMPT;
use crate::retrieval::RetrievalConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocumentsConfig {
    pub dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./documents"),
        }
    }
}

/// Ollama connection used to compute embeddings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// When disabled, retrieval runs in keyword fallback mode
    pub enabled: bool,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    Lancedb,
    Memory,
}

impl FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "lancedb" => Ok(Self::Lancedb),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    /// Qdrant REST endpoint; ignored by the embedded backends
    pub url: String,
    pub collection: String,
    pub min_score: f32,
    pub search_limit: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            collection: "knowledge-collection".to_string(),
            min_score: 0.2,
            search_limit: 10,
        }
    }
}

/// Local chat model served by Ollama
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "mistral".to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid vector backend: {0} (must be 'qdrant', 'lancedb' or 'memory')")]
    InvalidBackend(String),
    #[error("Invalid index id policy: {0} (must be 'append' or 'content_hash')")]
    InvalidIdPolicy(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),
    #[error("Invalid minimum score: {0} (must be between -1.0 and 1.0)")]
    InvalidMinScore(f32),
    #[error("Invalid search limit: {0} (must be between 1 and 1000)")]
    InvalidSearchLimit(usize),
    #[error("Per-result token cap ({0}) must be between 1 and the token budget ({1})")]
    InvalidTokenCap(usize, usize),
    #[error("Invalid value for environment variable {key}: {value}")]
    InvalidEnvValue { key: String, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".docs-rag"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("docs-rag"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir` and apply process environment overrides
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    /// Load `config.toml` from `config_dir`, resolving overrides through `lookup`
    #[inline]
    pub fn load_with_env<P, F>(config_dir: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .apply_env_overrides(lookup)
            .context("Invalid environment override")?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply the environment-style configuration surface on top of file settings
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DOCUMENTS_DIR") {
            self.documents.dir = PathBuf::from(dir);
        }
        if let Some(size) = parse_var(&lookup, "CHUNK_SIZE")? {
            self.chunking.chunk_size = size;
        }
        if let Some(overlap) = parse_var(&lookup, "CHUNK_OVERLAP")? {
            self.chunking.chunk_overlap = overlap;
        }
        if let Some(backend) = parse_var(&lookup, "VECTOR_BACKEND")? {
            self.vector_store.backend = backend;
        }
        if let Some(url) = lookup("QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(collection) = lookup("QDRANT_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dimension) = parse_var(&lookup, "EMBEDDING_DIMENSION")? {
            self.embedding.dimension = dimension;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            let url = Url::parse(&host).map_err(|_| ConfigError::InvalidUrl(host.clone()))?;
            let hostname = url
                .host_str()
                .ok_or_else(|| ConfigError::InvalidUrl(host.clone()))?
                .to_string();
            let port = url.port_or_known_default().unwrap_or(11434);
            for (protocol, host, p) in [
                (
                    &mut self.embedding.protocol,
                    &mut self.embedding.host,
                    &mut self.embedding.port,
                ),
                (&mut self.llm.protocol, &mut self.llm.host, &mut self.llm.port),
            ] {
                *protocol = url.scheme().to_string();
                *host = hostname.clone();
                *p = port;
            }
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(prompt) = lookup("SYSTEM_PROMPT") {
            self.llm.system_prompt = prompt;
        }
        if let Some(temperature) = parse_var(&lookup, "TEMPERATURE")? {
            self.llm.temperature = temperature;
        }
        if let Some(max_tokens) = parse_var(&lookup, "MAX_TOKENS")? {
            self.llm.max_tokens = max_tokens;
        }
        if let Some(budget) = parse_var(&lookup, "TOKEN_BUDGET")? {
            self.retrieval.token_budget = budget;
        }
        if let Some(cap) = parse_var(&lookup, "PER_RESULT_TOKEN_CAP")? {
            self.retrieval.per_result_token_cap = cap;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.server.port = port;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.server.log_level = level;
        }
        if let Some(policy) = parse_var::<IdPolicy, _>(&lookup, "INDEX_ID_POLICY")? {
            self.indexing.id_policy = policy;
        }
        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_chunking_config()?;
        self.embedding.validate()?;
        self.vector_store.validate()?;
        self.llm.validate()?;

        let retrieval = &self.retrieval;
        if retrieval.per_result_token_cap == 0
            || retrieval.per_result_token_cap > retrieval.token_budget
        {
            return Err(ConfigError::InvalidTokenCap(
                retrieval.per_result_token_cap,
                retrieval.token_budget,
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the embedded LanceDB directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key: key.to_string(),
                    value,
                })
        })
        .transpose()
}

fn validate_endpoint(protocol: &str, host: &str, port: u16) -> Result<Url, ConfigError> {
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::InvalidProtocol(protocol.to_string()));
    }

    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }

    let url_str = format!("{}://{}:{}", protocol, host, port);
    Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(1..=8192).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }
}

impl VectorStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == VectorBackend::Qdrant {
            Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))?;
        }

        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        if !(-1.0..=1.0).contains(&self.min_score) {
            return Err(ConfigError::InvalidMinScore(self.min_score));
        }

        if !(1..=1000).contains(&self.search_limit) {
            return Err(ConfigError::InvalidSearchLimit(self.search_limit));
        }

        Ok(())
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        validate_endpoint(&self.protocol, &self.host, self.port)
    }
}

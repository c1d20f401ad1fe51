use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub index: IndexConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub client: ClientConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// String that never shows up in logs or debug output.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    /// Hugging Face Inference API token (`HF_INFERENCE_API`).
    pub hf_token: Option<Secret>,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_body_size: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Requests per minute per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub text: u32,
    pub image: u32,
    pub default: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            text: 60,
            image: 30,
            default: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("index_store"),
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
    pub recursive: bool,
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
            recursive: false,
            max_file_size: iris_index::document::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: iris_index::DEFAULT_TOP_K,
        }
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    HuggingFace,
    Ollama,
    Candle,
    Mock,
}

impl EmbeddingProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
            Self::Candle => "candle",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    /// Backend default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: iris_llm::huggingface::DEFAULT_EMBEDDING_MODEL.into(),
            base_url: None,
        }
    }
}

/// Generation backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    #[default]
    HuggingFace,
    Ollama,
    Mock,
}

impl GenerationProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for GenerationProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    /// Model used for image questions; falls back to `model`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    pub max_new_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            base_url: None,
            model: iris_llm::huggingface::DEFAULT_MODEL.into(),
            vision_model: None,
            max_new_tokens: 256,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the HTTP service used by `ask`, `ask-image` and `chat`.
    pub api_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".into(),
        }
    }
}

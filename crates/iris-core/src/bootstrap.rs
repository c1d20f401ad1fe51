//! Builds the embedder, generator, query engine and ingestion pipeline from
//! a [`Config`].

use std::time::Duration;

use anyhow::Context;
use iris_index::document::{DirectoryLoader, SplitterConfig};
use iris_index::{IngestReport, IngestionPipeline, QueryEngine};
use iris_llm::http::client_with_timeout;
use iris_llm::huggingface::{self, HuggingFaceProvider};
use iris_llm::ollama::{self, OllamaProvider};
use iris_llm::{AnyEmbedder, AnyGenerator, Embedder, GenerationClient, LlmError};

use crate::config::{Config, EmbeddingProviderKind, GenerationProviderKind};

/// Text embedded once at startup to prove the embedder works.
const PROBE_TEXT: &str = "ping";

fn hf_token(config: &Config) -> Option<String> {
    config
        .secrets
        .hf_token
        .as_ref()
        .map(|s| s.expose().to_owned())
}

/// Construct the configured embedder without contacting it.
///
/// # Errors
///
/// Returns an error if the provider is unavailable in this build or a local
/// model fails to load.
pub fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let cfg = &config.embedding;
    match cfg.provider {
        EmbeddingProviderKind::HuggingFace => {
            let base_url = cfg
                .base_url
                .as_deref()
                .unwrap_or(huggingface::DEFAULT_BASE_URL);
            let provider = HuggingFaceProvider::new(
                base_url,
                hf_token(config),
                config.generation.model.clone(),
            )
            .with_embedding_model(cfg.model.clone());
            Ok(AnyEmbedder::HuggingFace(provider))
        }
        EmbeddingProviderKind::Ollama => {
            let base_url = cfg.base_url.as_deref().unwrap_or(ollama::DEFAULT_BASE_URL);
            Ok(AnyEmbedder::Ollama(OllamaProvider::new(
                base_url,
                config.generation.model.clone(),
                cfg.model.clone(),
            )))
        }
        #[cfg(feature = "candle")]
        EmbeddingProviderKind::Candle => {
            let embedder = iris_llm::candle_embed::CandleEmbedder::load(&cfg.model)
                .with_context(|| format!("failed to load candle embedder {}", cfg.model))?;
            Ok(AnyEmbedder::Candle(embedder))
        }
        #[cfg(not(feature = "candle"))]
        EmbeddingProviderKind::Candle => {
            anyhow::bail!("embedding provider `candle` requires the `candle` feature")
        }
        #[cfg(feature = "mock")]
        EmbeddingProviderKind::Mock => Ok(AnyEmbedder::Mock(
            iris_llm::mock::MockEmbedder::default(),
        )),
        #[cfg(not(feature = "mock"))]
        EmbeddingProviderKind::Mock => {
            anyhow::bail!("embedding provider `mock` requires the `mock` feature")
        }
    }
}

/// Construct the configured generation backend.
///
/// # Errors
///
/// Returns an error if the provider is unavailable in this build.
pub fn create_generator(config: &Config) -> anyhow::Result<AnyGenerator> {
    let cfg = &config.generation;
    match cfg.provider {
        GenerationProviderKind::HuggingFace => {
            let base_url = cfg
                .base_url
                .as_deref()
                .unwrap_or(huggingface::DEFAULT_BASE_URL);
            let provider = HuggingFaceProvider::new(base_url, hf_token(config), cfg.model.clone())
                .with_client(client_with_timeout(Duration::from_secs(cfg.timeout_secs)))
                .with_vision_model(cfg.vision_model.clone())
                .with_embedding_model(config.embedding.model.clone())
                .with_max_new_tokens(cfg.max_new_tokens);
            Ok(AnyGenerator::HuggingFace(provider))
        }
        GenerationProviderKind::Ollama => {
            let base_url = cfg.base_url.as_deref().unwrap_or(ollama::DEFAULT_BASE_URL);
            let provider =
                OllamaProvider::new(base_url, cfg.model.clone(), config.embedding.model.clone())
                    .with_vision_model(cfg.vision_model.clone());
            Ok(AnyGenerator::Ollama(provider))
        }
        #[cfg(feature = "mock")]
        GenerationProviderKind::Mock => Ok(AnyGenerator::Mock(
            iris_llm::mock::MockGenerator::default(),
        )),
        #[cfg(not(feature = "mock"))]
        GenerationProviderKind::Mock => {
            anyhow::bail!("generation provider `mock` requires the `mock` feature")
        }
    }
}

/// Embed a short probe text; any failure means the model cannot be used.
///
/// # Errors
///
/// Returns [`LlmError::ModelLoad`] wrapping the underlying failure.
pub async fn probe_embedder<E: Embedder>(embedder: &E) -> Result<usize, LlmError> {
    match embedder.embed(PROBE_TEXT).await {
        Ok(v) if v.is_empty() => Err(LlmError::ModelLoad(format!(
            "{} returned an empty embedding",
            embedder.name()
        ))),
        Ok(v) => Ok(v.len()),
        Err(e @ LlmError::ModelLoad(_)) => Err(e),
        Err(e) => Err(LlmError::ModelLoad(format!("{}: {e}", embedder.name()))),
    }
}

/// Create and probe the configured embedder. Failure is fatal for callers.
///
/// # Errors
///
/// Returns an error if the embedder cannot be constructed or the probe fails.
pub async fn build_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let embedder = create_embedder(config)?;
    let dimensions = probe_embedder(&embedder)
        .await
        .context("embedding model failed to initialise")?;
    tracing::info!(
        "embedder {} ready ({dimensions} dims)",
        Embedder::name(&embedder)
    );
    Ok(embedder)
}

/// # Errors
///
/// Returns an error if the generator cannot be constructed.
pub fn build_generation_client(config: &Config) -> anyhow::Result<GenerationClient<AnyGenerator>> {
    let generator = create_generator(config)?;
    tracing::info!(
        "generation provider {} (model {}, timeout {}s)",
        config.generation.provider,
        config.generation.model,
        config.generation.timeout_secs
    );
    Ok(GenerationClient::new(
        generator,
        Duration::from_secs(config.generation.timeout_secs),
    ))
}

/// Load the persisted index, leaving retrieval disabled if there is none.
///
/// # Errors
///
/// Returns an error if an index exists but cannot be loaded.
pub async fn load_query_engine(
    config: &Config,
    embedder: AnyEmbedder,
) -> anyhow::Result<QueryEngine<AnyEmbedder>> {
    QueryEngine::open(embedder, &config.index.dir, config.retrieval.top_k)
        .await
        .with_context(|| format!("failed to load index from {}", config.index.dir.display()))
}

#[must_use]
pub fn splitter_config(config: &Config) -> SplitterConfig {
    SplitterConfig {
        chunk_size: config.ingest.chunk_size,
        chunk_overlap: config.ingest.chunk_overlap,
        sentence_aware: config.ingest.sentence_aware,
    }
}

#[must_use]
pub fn directory_loader(config: &Config) -> DirectoryLoader {
    DirectoryLoader::new(config.ingest.max_file_size).with_recursive(config.ingest.recursive)
}

/// Full batch ingestion: probe the embedder, load `data_dir`, rebuild the index.
///
/// # Errors
///
/// Returns an error if the embedder is unusable or any pipeline stage fails.
pub async fn run_ingest(config: &Config) -> anyhow::Result<IngestReport> {
    let embedder = build_embedder(config).await?;
    ingest_with(config, embedder).await
}

/// Ingestion with an already constructed embedder.
///
/// # Errors
///
/// Returns an error if loading, embedding or persisting fails.
pub async fn ingest_with<E: Embedder>(config: &Config, embedder: E) -> anyhow::Result<IngestReport> {
    let pipeline = IngestionPipeline::new(embedder, splitter_config(config));
    pipeline
        .ingest_dir(
            &directory_loader(config),
            &config.index.data_dir,
            &config.index.dir,
        )
        .await
        .context("ingestion failed")
}

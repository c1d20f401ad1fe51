//! Local sentence-transformer embeddings with Candle.

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::error::LlmError;
use crate::provider::Embedder;

#[derive(Clone)]
pub struct CandleEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    name: String,
}

impl std::fmt::Debug for CandleEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEmbedder")
            .field("name", &self.name)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CandleEmbedder {
    /// Load a BERT sentence-transformer from the `HuggingFace` Hub onto the CPU.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ModelLoad`] if download or weight loading fails.
    pub fn load(repo_id: &str) -> Result<Self, LlmError> {
        Self::load_on(repo_id, &Device::Cpu)
    }

    /// # Errors
    ///
    /// Returns [`LlmError::ModelLoad`] if download or weight loading fails.
    pub fn load_on(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());

        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                LlmError::ModelLoad(format!("failed to download {file} from {repo_id}: {e}"))
            })
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to read BERT config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| LlmError::ModelLoad(format!("invalid BERT config: {e}")))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to load tokenizer: {e}")))?;

        // SAFETY: file is a valid safetensors downloaded from hf-hub, not modified during
        // VarBuilder lifetime
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
                .map_err(|e| LlmError::ModelLoad(format!("failed to map weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| LlmError::ModelLoad(format!("failed to build BERT model: {e}")))?;

        tracing::info!("loaded candle embedding model {repo_id}");
        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device: device.clone(),
            name: format!("candle:{repo_id}"),
        })
    }

    /// Mean-pooled, L2-normalised sentence embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the model forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let token_type_ids: Vec<u32> = vec![0; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let embeddings = self.model.forward(&input_ids, &token_type_ids, None)?;

        let seq_len = embeddings.dim(1)?;
        let sum = embeddings.sum(1)?;
        let mean_pooled = (sum
            / f64::from(
                u32::try_from(seq_len)
                    .map_err(|e| LlmError::Inference(format!("sequence length overflow: {e}")))?,
            ))?;

        let norm = mean_pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean_pooled.broadcast_div(&norm)?.squeeze(0)?;

        normalized.to_vec1::<f32>().map_err(LlmError::Candle)
    }
}

impl Embedder for CandleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let this = self.clone();
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || this.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("embedding task failed: {e}")))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

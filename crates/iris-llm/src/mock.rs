//! Test-only mock embedder and generator.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::media::ImageData;
use crate::provider::{Answer, Embedder, Generator};

pub const DEFAULT_MOCK_DIMENSIONS: usize = 64;

/// Deterministic hashed bag-of-words embedder.
///
/// Texts sharing words land close together under cosine similarity, which is
/// enough for retrieval tests without a real model.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimensions: usize,
    pub fail: bool,
    name: String,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DIMENSIONS)
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            fail: false,
            name: format!("mock:bow-{dimensions}"),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let mut idx = [0u8; 8];
            idx.copy_from_slice(&bytes[..8]);
            #[allow(clippy::cast_possible_truncation)]
            let slot = (u64::from_le_bytes(idx) % self.dimensions as u64) as usize;
            vector[slot] += if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail {
            return Err(LlmError::ModelLoad("mock embedder unavailable".into()));
        }
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct MockGenerator {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    /// Prefix every completion with the prompt, like raw text-generation endpoints do.
    pub echo_prompt: bool,
    pub fail: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock answer".into(),
            echo_prompt: false,
            fail: false,
            delay_ms: 0,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockGenerator {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_echo(mut self) -> Self {
        self.echo_prompt = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Prompts (or image questions) received so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn respond(&self, prompt: &str) -> Result<Answer, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_owned());
        if self.fail {
            return Err(LlmError::UpstreamUnavailable("mock upstream error".into()));
        }
        let text = {
            let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
            if responses.is_empty() {
                self.default_response.clone()
            } else {
                responses.remove(0)
            }
        };
        if self.echo_prompt {
            Ok(Answer::new(format!("{prompt}{text}")))
        } else {
            Ok(Answer::new(text))
        }
    }
}

impl Generator for MockGenerator {
    async fn complete(&self, prompt: &str) -> Result<Answer, LlmError> {
        self.respond(prompt).await
    }

    async fn describe_image(&self, _image: &ImageData, question: &str) -> Result<Answer, LlmError> {
        self.respond(question).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

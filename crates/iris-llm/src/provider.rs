use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::media::{ImageData, validate_image};

/// Narrow result shape every generation backend adapts its native response into.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Text → fixed-dimension vector.
///
/// Implementations must be deterministic for a fixed model configuration: the
/// index built at ingestion time is only searchable with the same embedder.
pub trait Embedder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a vector for `text`.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Identifier of the embedding model, stamped into persisted indexes.
    fn name(&self) -> &str;
}

/// A text-generation and image-understanding backend.
pub trait Generator: Send + Sync {
    /// Complete a fully composed prompt.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UpstreamUnavailable`] if the backend is unreachable or
    /// answers with a non-success status.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<Answer, LlmError>> + Send;

    /// Answer a question about an already validated image.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UpstreamUnavailable`] if the backend is unreachable or
    /// answers with a non-success status.
    fn describe_image(
        &self,
        image: &ImageData,
        question: &str,
    ) -> impl Future<Output = Result<Answer, LlmError>> + Send;

    fn name(&self) -> &str;
}

/// Build the single prompt sent for a retrieval-augmented text question.
#[must_use]
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!("{context}\n\nUser question: {question}")
}

/// Remove the prompt when a backend echoes it at the start of its output.
#[must_use]
pub fn strip_echo<'a>(prompt: &str, output: &'a str) -> &'a str {
    let trimmed = output.trim_start();
    trimmed
        .strip_prefix(prompt)
        .or_else(|| trimmed.strip_prefix(prompt.trim()))
        .unwrap_or(trimmed)
        .trim()
}

/// Entry point used by request handlers: prompt composition, image validation,
/// echo stripping and the per-call deadline live here, not in the backends.
#[derive(Debug, Clone)]
pub struct GenerationClient<G> {
    generator: G,
    timeout: Duration,
}

impl<G: Generator> GenerationClient<G> {
    #[must_use]
    pub fn new(generator: G, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// # Errors
    ///
    /// Returns [`LlmError::UpstreamUnavailable`] on backend failure or timeout.
    pub async fn generate_text(&self, context: &str, question: &str) -> Result<Answer, LlmError> {
        let prompt = compose_prompt(context, question);
        tracing::debug!(
            generator = self.generator.name(),
            prompt_len = prompt.len(),
            "generating text answer"
        );
        let answer = self.with_deadline(self.generator.complete(&prompt)).await?;
        Ok(Answer::new(strip_echo(&prompt, &answer.text)))
    }

    /// # Errors
    ///
    /// Returns [`LlmError::InvalidImage`] if `image_bytes` is not a decodable image,
    /// or [`LlmError::UpstreamUnavailable`] on backend failure or timeout.
    pub async fn generate_from_image(
        &self,
        image_bytes: &[u8],
        question: &str,
    ) -> Result<Answer, LlmError> {
        let image = validate_image(image_bytes)?;
        tracing::debug!(
            generator = self.generator.name(),
            mime = %image.mime_type,
            bytes = image.data.len(),
            "generating image answer"
        );
        let answer = self
            .with_deadline(self.generator.describe_image(&image, question))
            .await?;
        Ok(Answer::new(answer.text.trim()))
    }

    async fn with_deadline(
        &self,
        fut: impl Future<Output = Result<Answer, LlmError>>,
    ) -> Result<Answer, LlmError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::UpstreamUnavailable(format!(
                "{} timed out after {}s",
                self.generator.name(),
                self.timeout.as_secs()
            ))),
        }
    }
}

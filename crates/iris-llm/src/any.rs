//! Enum dispatch over the configured backends, so callers hold one concrete type.

#[cfg(feature = "candle")]
use crate::candle_embed::CandleEmbedder;
use crate::error::LlmError;
use crate::huggingface::HuggingFaceProvider;
use crate::media::ImageData;
#[cfg(feature = "mock")]
use crate::mock::{MockEmbedder, MockGenerator};
use crate::ollama::OllamaProvider;
use crate::provider::{Answer, Embedder, Generator};

macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::HuggingFace($p) => $expr,
            AnyEmbedder::Ollama($p) => $expr,
            #[cfg(feature = "candle")]
            AnyEmbedder::Candle($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_generator {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyGenerator::HuggingFace($p) => $expr,
            AnyGenerator::Ollama($p) => $expr,
            #[cfg(feature = "mock")]
            AnyGenerator::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    HuggingFace(HuggingFaceProvider),
    Ollama(OllamaProvider),
    #[cfg(feature = "candle")]
    Candle(CandleEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed(text).await)
    }

    fn name(&self) -> &str {
        delegate_embedder!(self, |p| Embedder::name(p))
    }
}

#[derive(Debug, Clone)]
pub enum AnyGenerator {
    HuggingFace(HuggingFaceProvider),
    Ollama(OllamaProvider),
    #[cfg(feature = "mock")]
    Mock(MockGenerator),
}

impl Generator for AnyGenerator {
    async fn complete(&self, prompt: &str) -> Result<Answer, LlmError> {
        delegate_generator!(self, |p| p.complete(prompt).await)
    }

    async fn describe_image(&self, image: &ImageData, question: &str) -> Result<Answer, LlmError> {
        delegate_generator!(self, |p| p.describe_image(image, question).await)
    }

    fn name(&self) -> &str {
        delegate_generator!(self, |p| Generator::name(p))
    }
}

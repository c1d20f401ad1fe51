//! Embedding and generation backends behind narrow `Embedder` / `Generator` interfaces.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_embed;
pub mod error;
pub mod http;
pub mod huggingface;
pub mod media;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod response;

pub use any::{AnyEmbedder, AnyGenerator};
pub use error::LlmError;
pub use provider::{Answer, Embedder, GenerationClient, Generator};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl LlmError {
    /// Whether the failure came from the remote side rather than the caller's input.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::EmptyResponse { .. }
        )
    }
}

use crate::document::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] iris_llm::LlmError),

    #[error("embedding dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

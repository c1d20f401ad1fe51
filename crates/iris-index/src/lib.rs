//! Ingest-then-retrieve: directory → fragments → embeddings → on-disk index → top-K context.

pub mod document;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod store;

pub use engine::{DEFAULT_TOP_K, IndexState, QueryEngine};
pub use error::IndexError;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use store::{IndexMeta, ScoredFragment, VectorIndex};

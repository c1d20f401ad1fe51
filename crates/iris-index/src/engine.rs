use std::path::Path;

use iris_llm::Embedder;

use crate::error::Result;
use crate::store::{ScoredFragment, VectorIndex};

/// Number of fragments joined into the retrieved context by default.
pub const DEFAULT_TOP_K: usize = 2;

/// Separator between fragment texts in the retrieved context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Whether an index was found at startup. Fixed for the life of the process.
#[derive(Debug, Clone)]
pub enum IndexState {
    Unloaded,
    Loaded(VectorIndex),
}

/// Turns a question into retrieved context using the index loaded at startup.
///
/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct QueryEngine<E> {
    embedder: E,
    state: IndexState,
    top_k: usize,
}

impl<E: Embedder> QueryEngine<E> {
    #[must_use]
    pub fn new(embedder: E, state: IndexState, top_k: usize) -> Self {
        Self {
            embedder,
            state,
            top_k: top_k.max(1),
        }
    }

    /// Load the index from `dir`, falling back to [`IndexState::Unloaded`]
    /// when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if an index is present but corrupt.
    pub async fn open(embedder: E, dir: &Path, top_k: usize) -> Result<Self> {
        let state = match VectorIndex::load(dir).await? {
            Some(index) => {
                if index.meta().embedder != embedder.name() {
                    tracing::warn!(
                        "index at {} was built with embedder {}, serving with {}",
                        dir.display(),
                        index.meta().embedder,
                        embedder.name()
                    );
                }
                IndexState::Loaded(index)
            }
            None => {
                tracing::warn!(
                    "no index found at {}, retrieval disabled (run `iris ingest` first)",
                    dir.display()
                );
                IndexState::Unloaded
            }
        };
        Ok(Self::new(embedder, state, top_k))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, IndexState::Loaded(_))
    }

    #[must_use]
    pub fn fragment_count(&self) -> usize {
        match &self.state {
            IndexState::Loaded(index) => index.len(),
            IndexState::Unloaded => 0,
        }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Top-K fragments with their scores, best first. Empty when unloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or its dimensionality
    /// differs from the index.
    pub async fn search(&self, query: &str) -> Result<Vec<ScoredFragment>> {
        let IndexState::Loaded(index) = &self.state else {
            return Ok(Vec::new());
        };
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let hits = index.search(&vector, self.top_k)?;
        tracing::debug!(
            "retrieved {} fragments, best score {:?}",
            hits.len(),
            hits.first().map(|h| h.score)
        );
        Ok(hits)
    }

    /// Texts of the top-K fragments joined by a blank line. `""` when unloaded.
    ///
    /// # Errors
    ///
    /// See [`Self::search`].
    pub async fn retrieve(&self, query: &str) -> Result<String> {
        let hits = self.search(query).await?;
        Ok(hits
            .iter()
            .map(|h| h.fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }
}

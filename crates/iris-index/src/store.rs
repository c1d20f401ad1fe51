//! On-disk vector index: an ordered list of fragments with their embeddings.
//!
//! Layout of an index directory:
//!
//! - `index_meta.json`: [`IndexMeta`]
//! - `fragments-<generation>.json`: array of fragments, each carrying its
//!   `embedding` (`fragments.json` for generation 0)
//!
//! Every rebuild writes its fragments under a new generation before the
//! metadata is renamed into place, so the metadata on disk always names a
//! complete fragments file, even if a rebuild is interrupted.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Fragment, SplitterConfig};
use crate::error::{IndexError, Result};

pub const FORMAT_VERSION: u32 = 1;
pub const META_FILE: &str = "index_meta.json";
pub const FRAGMENTS_FILE: &str = "fragments.json";

/// Fragments file written by a given index generation.
#[must_use]
pub fn fragments_file(generation: u64) -> String {
    if generation == 0 {
        FRAGMENTS_FILE.to_owned()
    } else {
        format!("fragments-{generation}.json")
    }
}

fn is_fragments_file(name: &str) -> bool {
    name.starts_with("fragments")
        && (name.ends_with(".json") || name.ends_with(".json.tmp"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    /// Name of the embedder that produced the vectors.
    pub embedder: String,
    pub dimensions: usize,
    pub fragment_count: usize,
    pub created_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Bumped on every persist; selects the fragments file.
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFragment {
    #[serde(flatten)]
    pub fragment: Fragment,
    pub embedding: Vec<f32>,
}

/// A fragment with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    meta: IndexMeta,
    entries: Vec<StoredFragment>,
}

impl VectorIndex {
    /// Empty index stamped with the embedder name and chunking settings.
    #[must_use]
    pub fn new(embedder: impl Into<String>, splitter: &SplitterConfig) -> Self {
        Self {
            meta: IndexMeta {
                format_version: FORMAT_VERSION,
                embedder: embedder.into(),
                dimensions: 0,
                fragment_count: 0,
                created_at: Utc::now(),
                chunk_size: splitter.chunk_size,
                chunk_overlap: splitter.chunk_overlap,
                generation: 0,
            },
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.entries.iter().map(|e| &e.fragment)
    }

    /// Append a fragment. The first vector fixes the index dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the vector length differs
    /// from the established dimensionality, or [`IndexError::Corrupt`] for an
    /// empty vector.
    pub fn push(&mut self, fragment: Fragment, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            return Err(IndexError::Corrupt(format!(
                "empty embedding for fragment {}",
                fragment.id
            )));
        }
        if self.meta.dimensions == 0 {
            self.meta.dimensions = embedding.len();
        } else if embedding.len() != self.meta.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.meta.dimensions,
                found: embedding.len(),
            });
        }
        self.entries.push(StoredFragment {
            fragment,
            embedding,
        });
        self.meta.fragment_count = self.entries.len();
        Ok(())
    }

    /// Top `k` fragments by cosine similarity, highest first.
    ///
    /// Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the query vector does not
    /// match the index dimensionality.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredFragment>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.meta.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.meta.dimensions,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredFragment {
                fragment: self.entries[i].fragment.clone(),
                score,
            })
            .collect())
    }

    /// Write the index into `dir`, replacing any previous index there.
    ///
    /// The fragments go to the next generation's file first; the metadata
    /// rename is the commit point. Fragments files of older generations are
    /// removed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a file cannot
    /// be written or renamed.
    pub async fn persist(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let mut meta = self.meta.clone();
        meta.generation = current_generation(dir).await.map_or(1, |g| g + 1);
        let current = fragments_file(meta.generation);

        let fragments = serde_json::to_vec(&self.entries)?;
        write_atomic(&dir.join(&current), &fragments).await?;

        let meta_bytes = serde_json::to_vec_pretty(&meta)?;
        write_atomic(&dir.join(META_FILE), &meta_bytes).await?;

        remove_stale_fragments(dir, &current).await;

        tracing::info!(
            "persisted {} fragments ({} dims, generation {}) to {}",
            self.entries.len(),
            meta.dimensions,
            meta.generation,
            dir.display()
        );
        Ok(())
    }

    /// Read an index from `dir`.
    ///
    /// Returns `Ok(None)` when the directory is missing or holds no index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index files exist but cannot be parsed, or
    /// violate the one-vector-per-fragment invariant.
    pub async fn load(dir: &Path) -> Result<Option<Self>> {
        let meta_path = dir.join(META_FILE);
        if !tokio::fs::try_exists(&meta_path).await? {
            return Ok(None);
        }

        let meta: IndexMeta = serde_json::from_slice(&tokio::fs::read(&meta_path).await?)?;
        if meta.format_version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(meta.format_version));
        }

        let fragments_path = dir.join(fragments_file(meta.generation));
        let raw = match tokio::fs::read(&fragments_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::Corrupt(format!(
                    "{} is missing",
                    fragments_path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<StoredFragment> = serde_json::from_slice(&raw)?;

        if entries.len() != meta.fragment_count {
            return Err(IndexError::Corrupt(format!(
                "expected {} fragments, found {}",
                meta.fragment_count,
                entries.len()
            )));
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != meta.dimensions)
        {
            return Err(IndexError::DimensionMismatch {
                expected: meta.dimensions,
                found: bad.embedding.len(),
            });
        }

        tracing::info!(
            "loaded index from {}: {} fragments, {} dims, embedder {}",
            dir.display(),
            entries.len(),
            meta.dimensions,
            meta.embedder
        );
        Ok(Some(Self { meta, entries }))
    }
}

/// Generation recorded in an existing index, if one can be read.
async fn current_generation(dir: &Path) -> Option<u64> {
    let raw = tokio::fs::read(dir.join(META_FILE)).await.ok()?;
    serde_json::from_slice::<IndexMeta>(&raw)
        .ok()
        .map(|meta| meta.generation)
}

async fn remove_stale_fragments(dir: &Path, current: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name != current
            && is_fragments_file(name)
            && let Err(e) = tokio::fs::remove_file(entry.path()).await
        {
            tracing::warn!("failed to remove stale {name}: {e}");
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    // overflowing norms give inf / inf
    if score.is_finite() { score } else { 0.0 }
}

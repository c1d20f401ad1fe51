use std::fmt;
use std::path::Path;

use iris_llm::Embedder;
use serde::Serialize;

use crate::document::{DirectoryLoader, Document, SplitterConfig, TextSplitter};
use crate::error::Result;
use crate::store::VectorIndex;

/// Summary of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub fragments: usize,
    pub dimensions: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents, {} fragments, {} dimensions",
            self.documents, self.fragments, self.dimensions
        )
    }
}

/// Offline batch job: documents → fragments → embeddings → persisted index.
pub struct IngestionPipeline<E> {
    splitter: TextSplitter,
    embedder: E,
}

impl<E: Embedder> IngestionPipeline<E> {
    #[must_use]
    pub fn new(embedder: E, splitter: SplitterConfig) -> Self {
        Self {
            splitter: TextSplitter::new(splitter),
            embedder,
        }
    }

    /// Split and embed every document into an in-memory index.
    ///
    /// # Errors
    ///
    /// Returns an error if any fragment fails to embed or the embedder
    /// returns vectors of differing lengths.
    pub async fn build(&self, documents: &[Document]) -> Result<VectorIndex> {
        let mut index = VectorIndex::new(self.embedder.name(), self.splitter.config());

        for document in documents {
            let fragments = self.splitter.split(document);
            tracing::debug!(
                "{}: {} fragments",
                document.source(),
                fragments.len()
            );
            for fragment in fragments {
                let embedding = self.embedder.embed(&fragment.text).await?;
                index.push(fragment, embedding)?;
            }
        }

        Ok(index)
    }

    /// Load `data_dir`, build the index and replace whatever is in `index_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, embedding or persisting fails.
    pub async fn ingest_dir(
        &self,
        loader: &DirectoryLoader,
        data_dir: &Path,
        index_dir: &Path,
    ) -> Result<IngestReport> {
        let documents = loader.load_dir(data_dir).await?;
        let index = self.build(&documents).await?;
        index.persist(index_dir).await?;

        let report = IngestReport {
            documents: documents.len(),
            fragments: index.len(),
            dimensions: index.meta().dimensions,
        };
        tracing::info!("ingestion complete: {report}");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use iris_llm::mock::MockEmbedder;

    use super::*;
    use crate::error::IndexError;

    fn pipeline() -> IngestionPipeline<MockEmbedder> {
        IngestionPipeline::new(
            MockEmbedder::new(16),
            SplitterConfig {
                chunk_size: 40,
                chunk_overlap: 10,
                sentence_aware: true,
            },
        )
    }

    #[tokio::test]
    async fn ingest_writes_index_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        let index_dir = tmp.path().join("index");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("a.txt"), "Short note.").unwrap();
        std::fs::write(
            data.join("b.md"),
            "First sentence here. Second sentence here. Third sentence here.",
        )
        .unwrap();

        let report = pipeline()
            .ingest_dir(&DirectoryLoader::default(), &data, &index_dir)
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert!(report.fragments >= 2);
        assert_eq!(report.dimensions, 16);

        let index = VectorIndex::load(&index_dir).await.unwrap().unwrap();
        assert_eq!(index.len(), report.fragments);
        assert_eq!(index.meta().embedder, "mock:bow-16");
        assert_eq!(index.meta().chunk_size, 40);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        let index_dir = tmp.path().join("index");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("a.txt"), "One. Two. Three. Four. Five. Six. Seven.").unwrap();

        let loader = DirectoryLoader::default();
        let first = pipeline().ingest_dir(&loader, &data, &index_dir).await.unwrap();
        let second = pipeline().ingest_dir(&loader, &data, &index_dir).await.unwrap();
        assert_eq!(first, second);

        let index = VectorIndex::load(&index_dir).await.unwrap().unwrap();
        assert_eq!(index.len(), first.fragments);
    }

    #[tokio::test]
    async fn missing_data_dir_is_seeded() {
        let tmp = tempfile::tempdir().unwrap();
        let report = pipeline()
            .ingest_dir(
                &DirectoryLoader::default(),
                &tmp.path().join("data"),
                &tmp.path().join("index"),
            )
            .await
            .unwrap();
        assert_eq!(report.documents, 1);
        assert!(report.fragments >= 1);
    }

    #[tokio::test]
    async fn empty_data_dir_builds_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let index_dir = tmp.path().join("index");

        let report = pipeline()
            .ingest_dir(&DirectoryLoader::default(), &data, &index_dir)
            .await
            .unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(report.fragments, 0);

        let index = VectorIndex::load(&index_dir).await.unwrap().unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn embedder_failure_aborts_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("a.txt"), "text").unwrap();
        let index_dir = tmp.path().join("index");

        let failing = IngestionPipeline::new(MockEmbedder::failing(), SplitterConfig::default());
        let err = failing
            .ingest_dir(&DirectoryLoader::default(), &data, &index_dir)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert!(!index_dir.exists());
    }

    #[test]
    fn report_display() {
        let report = IngestReport {
            documents: 2,
            fragments: 5,
            dimensions: 384,
        };
        assert_eq!(report.to_string(), "2 documents, 5 fragments, 384 dimensions");
    }
}

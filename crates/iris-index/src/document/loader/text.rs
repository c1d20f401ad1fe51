use std::path::Path;

use super::super::{DEFAULT_MAX_FILE_SIZE, DocumentError};
use super::{DocumentLoader, LoadFuture, build_document};

pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load<'a>(&'a self, path: &'a Path) -> LoadFuture<'a> {
        Box::pin(async move {
            let path = tokio::fs::canonicalize(path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > self.max_file_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("md" | "markdown") => "text/markdown",
                _ => "text/plain",
            };

            let text = tokio::fs::read_to_string(&path).await?;
            Ok(build_document(&path, text, content_type, meta.len()))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown", "text", "rst", "csv", "json"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::types::{META_CONTENT_TYPE, META_FILE_PATH, META_FILE_SIZE};

    #[tokio::test]
    async fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "hello world").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.text, "hello world");
        assert_eq!(doc.metadata[META_CONTENT_TYPE], "text/plain");
        assert_eq!(doc.metadata[META_FILE_SIZE], "11");
    }

    #[tokio::test]
    async fn load_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("readme.md");
        std::fs::write(&file, "# Title").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.metadata[META_CONTENT_TYPE], "text/markdown");
    }

    #[tokio::test]
    async fn load_nonexistent_file() {
        let result = TextLoader::default()
            .load(Path::new("/nonexistent/file.txt"))
            .await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }

    #[tokio::test]
    async fn source_is_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "data").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(doc.metadata[META_FILE_PATH], canonical.display().to_string());
        assert_eq!(doc.source(), canonical.display().to_string());
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "x").unwrap();

        let loader = TextLoader { max_file_size: 0 };
        assert!(matches!(
            loader.load(&file).await,
            Err(DocumentError::FileTooLarge(1))
        ));
    }

    #[test]
    fn supported_extensions_list() {
        let loader = TextLoader::default();
        let exts = loader.supported_extensions();
        assert!(exts.contains(&"txt"));
        assert!(exts.contains(&"md"));
        assert!(!exts.contains(&"pdf"));
    }
}

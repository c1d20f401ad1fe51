use std::path::Path;

use super::super::{DEFAULT_MAX_FILE_SIZE, DocumentError};
use super::{DocumentLoader, LoadFuture, build_document};

pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load<'a>(&'a self, path: &'a Path) -> LoadFuture<'a> {
        Box::pin(async move {
            let path = tokio::fs::canonicalize(path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > self.max_file_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let extract_path = path.clone();
            let text = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&extract_path).map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;

            Ok(build_document(&path, text, "application/pdf", meta.len()))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, "not a pdf").unwrap();
        assert!(PdfLoader::default().load(&file).await.is_err());
    }
}

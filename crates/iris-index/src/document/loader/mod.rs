mod text;
#[cfg(feature = "pdf")]
mod pdf;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub use text::TextLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;

use super::types::{
    Document, META_CONTENT_TYPE, META_FILE_NAME, META_FILE_PATH, META_FILE_SIZE,
};
use super::{DEFAULT_MAX_FILE_SIZE, DocumentError, PLACEHOLDER_FILE, PLACEHOLDER_TEXT};

pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<Document, DocumentError>> + Send + 'a>>;

/// Reads one file of a supported format into a [`Document`].
pub trait DocumentLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a Path) -> LoadFuture<'a>;

    fn supported_extensions(&self) -> &[&str];
}

/// Deterministic document id: the same canonical path always maps to the same id.
#[must_use]
pub fn document_id(path: &Path) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()).to_string()
}

pub(crate) fn build_document(path: &Path, text: String, content_type: &str, size: u64) -> Document {
    let mut metadata = BTreeMap::new();
    metadata.insert(META_FILE_PATH.to_owned(), path.display().to_string());
    if let Some(name) = path.file_name() {
        metadata.insert(META_FILE_NAME.to_owned(), name.to_string_lossy().into_owned());
    }
    metadata.insert(META_CONTENT_TYPE.to_owned(), content_type.to_owned());
    metadata.insert(META_FILE_SIZE.to_owned(), size.to_string());
    Document {
        id: document_id(path),
        text,
        metadata,
    }
}

/// Loads every supported file in a directory, dispatching on file extension.
pub struct DirectoryLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
    recursive: bool,
}

impl std::fmt::Debug for DirectoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLoader")
            .field("loaders", &self.loaders.len())
            .field("recursive", &self.recursive)
            .finish()
    }
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl DirectoryLoader {
    /// Loader with every built-in format registered.
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        #[cfg_attr(not(feature = "pdf"), allow(unused_mut))]
        let mut loaders: Vec<Box<dyn DocumentLoader>> = vec![Box::new(TextLoader { max_file_size })];
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(PdfLoader { max_file_size }));
        Self {
            loaders,
            recursive: false,
        }
    }

    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(AsRef::as_ref)
    }

    /// Load a single file with the loader registered for its extension.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] if no loader handles the
    /// extension, or the loader's own error.
    pub async fn load_file(&self, path: &Path) -> Result<Document, DocumentError> {
        let loader = self
            .loader_for(path)
            .ok_or_else(|| DocumentError::UnsupportedFormat(path.display().to_string()))?;
        loader.load(path).await
    }

    /// Load all documents under `dir`.
    ///
    /// A missing directory is created and seeded with a placeholder document.
    /// Unreadable or unsupported files are skipped with a warning; an empty or
    /// unreadable directory yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error only if a missing directory cannot be created or seeded.
    pub async fn load_dir(&self, dir: &Path) -> Result<Vec<Document>, DocumentError> {
        if !tokio::fs::try_exists(dir).await? {
            seed_placeholder(dir).await?;
        }

        let files = self.collect_files(dir).await;
        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match self.load_file(&path).await {
                Ok(doc) => documents.push(doc),
                Err(DocumentError::UnsupportedFormat(_)) => {
                    tracing::debug!("skipping unsupported file {}", path.display());
                }
                Err(e) => tracing::warn!("skipping {}: {e}", path.display()),
            }
        }

        tracing::info!("loaded {} documents from {}", documents.len(), dir.display());
        Ok(documents)
    }

    /// Regular, non-hidden files in sorted path order.
    /// Unreadable directories and entries are skipped with a warning.
    async fn collect_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut pending = vec![dir.to_path_buf()];
        let mut files = Vec::new();

        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("skipping unreadable directory {}: {e}", current.display());
                    continue;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("stopped listing {}: {e}", current.display());
                        break;
                    }
                };
                let path = entry.path();
                if is_hidden(&path) {
                    continue;
                }
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        tracing::warn!("skipping {}: {e}", path.display());
                        continue;
                    }
                };
                if file_type.is_dir() {
                    if self.recursive {
                        pending.push(path);
                    }
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        files
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

async fn seed_placeholder(dir: &Path) -> Result<(), DocumentError> {
    tokio::fs::create_dir_all(dir).await?;
    let sample = dir.join(PLACEHOLDER_FILE);
    tokio::fs::write(&sample, PLACEHOLDER_TEXT).await?;
    tracing::info!(
        "data directory {} did not exist, seeded {}",
        dir.display(),
        sample.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_is_created_and_seeded() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data");

        let docs = DirectoryLoader::default().load_dir(&dir).await.unwrap();
        assert!(dir.join(PLACEHOLDER_FILE).exists());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, PLACEHOLDER_TEXT);
    }

    #[tokio::test]
    async fn empty_directory_yields_no_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = DirectoryLoader::default().load_dir(tmp.path()).await.unwrap();
        assert!(docs.is_empty());
        assert!(!tmp.path().join(PLACEHOLDER_FILE).exists());
    }

    #[tokio::test]
    async fn loads_supported_files_in_sorted_order() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.md"), "# B").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "A").unwrap();
        std::fs::write(tmp.path().join("image.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(tmp.path().join(".hidden.txt"), "secret").unwrap();

        let docs = DirectoryLoader::default().load_dir(tmp.path()).await.unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "# B"]);
        assert_eq!(docs[1].metadata[META_CONTENT_TYPE], "text/markdown");
        assert_eq!(docs[0].metadata[META_FILE_NAME], "a.txt");
    }

    #[tokio::test]
    async fn subdirectories_only_when_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("nested").join("deep.txt"), "deep").unwrap();
        std::fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let flat = DirectoryLoader::default().load_dir(tmp.path()).await.unwrap();
        assert_eq!(flat.len(), 1);

        let deep = DirectoryLoader::default()
            .with_recursive(true)
            .load_dir(tmp.path())
            .await
            .unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[tokio::test]
    async fn oversized_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("big.txt"), "xxxxxxxxxx").unwrap();
        std::fs::write(tmp.path().join("small.txt"), "x").unwrap();

        let docs = DirectoryLoader::new(5).load_dir(tmp.path()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "x");
    }

    #[tokio::test]
    async fn non_utf8_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.txt"), [0xFF, 0xFE, 0x00, 0xC3]).unwrap();
        let docs = DirectoryLoader::default().load_dir(tmp.path()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn ids_are_stable_across_loads() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "A").unwrap();
        let loader = DirectoryLoader::default();
        let first = loader.load_dir(tmp.path()).await.unwrap();
        let second = loader.load_dir(tmp.path()).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
    }

    #[tokio::test]
    async fn unsupported_extension_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("photo.png");
        std::fs::write(&file, [0u8; 4]).unwrap();
        let err = DirectoryLoader::default().load_file(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn path_that_is_not_a_directory_yields_no_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "not a directory").unwrap();

        let docs = DirectoryLoader::default().load_dir(&file).await.unwrap();
        assert!(docs.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_directory_yields_no_documents() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("locked");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), "A").unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o000)).unwrap();

        let locked = std::fs::read_dir(&dir).is_err();
        let result = DirectoryLoader::default().load_dir(&dir).await;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        // permission bits are not enforced for privileged users
        if locked {
            assert!(result.unwrap().is_empty());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("deep.txt"), "deep").unwrap();
        std::fs::write(tmp.path().join("top.txt"), "top").unwrap();
        std::fs::set_permissions(&nested, std::fs::Permissions::from_mode(0o000)).unwrap();

        let locked = std::fs::read_dir(&nested).is_err();
        let result = DirectoryLoader::default()
            .with_recursive(true)
            .load_dir(tmp.path())
            .await;
        std::fs::set_permissions(&nested, std::fs::Permissions::from_mode(0o755)).unwrap();

        let docs = result.unwrap();
        let expected = if locked { 1 } else { 2 };
        assert_eq!(docs.len(), expected);
        assert_eq!(docs.last().unwrap().text, "top");
    }

    #[test]
    fn default_registers_builtin_formats() {
        let loader = DirectoryLoader::default();
        let expected = if cfg!(feature = "pdf") { 2 } else { 1 };
        assert_eq!(loader.loaders.len(), expected);
        assert!(loader.loader_for(Path::new("notes.md")).is_some());
        assert_eq!(
            loader.loader_for(Path::new("paper.pdf")).is_some(),
            cfg!(feature = "pdf")
        );
    }

    #[test]
    fn hidden_detection() {
        assert!(is_hidden(Path::new("/tmp/.git")));
        assert!(!is_hidden(Path::new("/tmp/notes.txt")));
    }
}

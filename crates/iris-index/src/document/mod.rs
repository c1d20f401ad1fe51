pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
pub use loader::{DirectoryLoader, DocumentLoader, TextLoader};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Document, Fragment};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Name and content of the document seeded into a freshly created data directory.
pub const PLACEHOLDER_FILE: &str = "sample.txt";
pub const PLACEHOLDER_TEXT: &str =
    "This is a sample document for testing the retrieval-augmented question answering service.";

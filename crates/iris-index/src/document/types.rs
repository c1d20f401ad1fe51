use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata keys filled in by the loaders.
pub const META_FILE_PATH: &str = "file_path";
pub const META_FILE_NAME: &str = "file_name";
pub const META_CONTENT_TYPE: &str = "content_type";
pub const META_FILE_SIZE: &str = "file_size";

/// One loaded file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    #[must_use]
    pub fn source(&self) -> &str {
        self.metadata
            .get(META_FILE_PATH)
            .map_or(self.id.as_str(), String::as_str)
    }
}

/// A chunk of a [`Document`]; the unit that gets embedded and retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

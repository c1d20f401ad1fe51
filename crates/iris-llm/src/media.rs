//! Uploaded image validation.

use crate::error::LlmError;

/// Raw image bytes that are known to decode, plus their detected MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    /// File extension matching the detected format, used when re-uploading.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            _ => "jpg",
        }
    }
}

/// Check that `bytes` decode as an image and detect their format.
///
/// # Errors
///
/// Returns [`LlmError::InvalidImage`] for empty input, an unrecognised format, or
/// data that fails to decode.
pub fn validate_image(bytes: &[u8]) -> Result<ImageData, LlmError> {
    if bytes.is_empty() {
        return Err(LlmError::InvalidImage("empty upload".into()));
    }
    let format =
        image::guess_format(bytes).map_err(|e| LlmError::InvalidImage(format!("{e}")))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| LlmError::InvalidImage(format!("{e}")))?;

    Ok(ImageData {
        data: bytes.to_vec(),
        mime_type: format.to_mime_type().to_owned(),
    })
}

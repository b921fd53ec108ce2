//! Raw document input and its validation.

use fatura_vision::DocumentPayload;

use crate::error::InputError;
use crate::models::config::InputConfig;

/// A raw file submitted for ingestion: bytes plus a declared media type.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    /// Original file name, kept for display and result ordering.
    pub name: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data,
        }
    }

    /// Wire payload for the completion service.
    pub fn payload(&self) -> DocumentPayload {
        DocumentPayload {
            media_type: self.media_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Fixed allow-list: PDF and any image type.
pub fn media_type_allowed(media_type: &str) -> bool {
    media_type == "application/pdf" || media_type.starts_with("image/")
}

/// Declared media type for a file extension, for callers that only have a
/// path.
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "tiff" | "tif" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Validate a file before any processing. Rejections here never consume a
/// retry.
pub fn validate_file(file: &DocumentFile, config: &InputConfig) -> Result<(), InputError> {
    if file.data.is_empty() {
        return Err(InputError::Empty);
    }

    if !media_type_allowed(&file.media_type) {
        return Err(InputError::UnsupportedMediaType(file.media_type.clone()));
    }

    let size = file.data.len() as u64;
    if size > config.max_file_bytes {
        return Err(InputError::TooLarge {
            size,
            limit: config.max_file_bytes,
        });
    }

    Ok(())
}

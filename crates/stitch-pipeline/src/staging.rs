//! Local file staging: validation and displayable previews.
//!
//! Staging is purely in-memory; nothing touches the network until the user
//! submits the batch.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Upload progress of one staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Staged,
    Uploading,
    Uploaded,
    Failed,
}

/// One locally staged image awaiting submission.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Arc<Vec<u8>>,
    /// Data-URL preview for display; derived once at staging time.
    pub preview: String,
    pub status: UploadStatus,
}

impl StagedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let preview = data_url_preview(&mime_type, &bytes);
        StagedFile {
            name: name.into(),
            mime_type,
            bytes: Arc::new(bytes),
            preview,
            status: UploadStatus::Staged,
        }
    }
}

/// The service accepts PNG and JPEG uploads only.
pub fn is_supported_image(mime_type: &str) -> bool {
    matches!(mime_type, "image/jpeg" | "image/jpg" | "image/png")
}

/// Base64 data URL for inline display of a staged image.
pub fn data_url_preview(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

//! File ingestion: MIME validation, async read, base64 payload, preview copy.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;
use tracing::info;

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A user's file choice together with its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub path: PathBuf,
    pub mime_type: String,
}

impl FileSelection {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Declare the MIME type from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_type_for_path(&path).to_string();
        Self { path, mime_type }
    }
}

/// Locally resolvable copy of an uploaded file, deleted on drop.
#[derive(Debug)]
pub struct PreviewFile {
    path: tempfile::TempPath,
}

impl PreviewFile {
    async fn create(source: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let path = tempfile::Builder::new()
            .prefix("fineprint-preview-")
            .suffix(&suffix)
            .tempfile()?
            .into_temp_path();
        // On failure `path` drops here and the partial copy is removed.
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A successfully ingested document.
#[derive(Debug)]
pub struct UploadedFile {
    pub name: String,
    pub preview: PreviewFile,
    pub base64: String,
    pub mime_type: String,
    pub size: u64,
}

/// Accept `image/*` and `application/pdf`, reject everything else.
pub fn validate_mime_type(mime_type: &str) -> Result<(), IngestError> {
    if mime_type.starts_with("image/") || mime_type == PDF_MIME_TYPE {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFileType(mime_type.to_string()))
    }
}

/// Best-effort MIME type for a path, by extension.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MIME_TYPE,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => UNKNOWN_MIME_TYPE,
    }
}

/// Read and encode a selected file.
///
/// Nothing is returned unless the read, the preview copy, and the encoding
/// all succeed.
pub async fn ingest(selection: &FileSelection) -> Result<UploadedFile, IngestError> {
    validate_mime_type(&selection.mime_type)?;

    let read_error = |source| IngestError::FileRead {
        path: selection.path.clone(),
        source,
    };
    let bytes = tokio::fs::read(&selection.path).await.map_err(read_error)?;
    let preview = PreviewFile::create(&selection.path, &bytes)
        .await
        .map_err(read_error)?;
    let base64 = BASE64.encode(&bytes);

    let name = selection
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!(
        file = %name,
        mime_type = %selection.mime_type,
        size = bytes.len(),
        preview = %preview.path().display(),
        "ingested file"
    );

    Ok(UploadedFile {
        name,
        preview,
        base64,
        mime_type: selection.mime_type.clone(),
        size: bytes.len() as u64,
    })
}

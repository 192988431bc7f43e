// staging.rs: Multipart intake. The uploaded file is spooled to a unique
// path in the upload directory and removed when the guard drops, on every
// exit path of a handler.

use axum::extract::Multipart;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::RelayError;

/// A staged upload on disk. Dropping it deletes the file.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `ext` (including the dot) to the staged file name.
    pub async fn rename_with_extension(&mut self, ext: &str) -> std::io::Result<()> {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(ext);
        let renamed = PathBuf::from(name);
        tokio::fs::rename(&self.path, &renamed).await?;
        log::debug!("Staged upload renamed to {}", renamed.display());
        self.path = renamed;
        Ok(())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// The fields of an analyze request.
#[derive(Debug)]
pub struct UploadForm {
    pub file: Option<StagedUpload>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Read every multipart field, staging `file` under `upload_dir`.
pub async fn read_upload_form(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<UploadForm, RelayError> {
    let mut form = UploadForm {
        file: None,
        latitude: None,
        longitude: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Multipart(e.to_string()))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().map(|c| c.to_string());
                let file_name = field.file_name().map(|n| n.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RelayError::Multipart(e.to_string()))?;
                let mut staged = stage_bytes(upload_dir, &bytes).await?;
                staged.content_type = content_type;
                staged.file_name = file_name;
                log::debug!(
                    "Received {} bytes into {}",
                    bytes.len(),
                    staged.path.display()
                );
                form.file = Some(staged);
            }
            Some("latitude") => {
                form.latitude = Some(read_text(field).await?);
            }
            Some("longitude") => {
                form.longitude = Some(read_text(field).await?);
            }
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, RelayError> {
    field
        .text()
        .await
        .map_err(|e| RelayError::Multipart(e.to_string()))
}

async fn stage_bytes(upload_dir: &Path, bytes: &[u8]) -> Result<StagedUpload, RelayError> {
    let (file, path) = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(upload_dir)
        .and_then(|t| t.keep().map_err(|e| e.error))
        .map_err(RelayError::Storage)?;

    // Guard first so a failed write still cleans up.
    let staged = StagedUpload {
        path,
        content_type: None,
        file_name: None,
    };

    let mut file = tokio::fs::File::from_std(file);
    file.write_all(bytes).await.map_err(RelayError::Storage)?;
    file.flush().await.map_err(RelayError::Storage)?;

    Ok(staged)
}

/// Extension the transcription upstream needs to pick a decoder.
pub fn audio_extension(content_type: Option<&str>, file_name: Option<&str>) -> String {
    match content_type {
        Some("audio/mpeg") => ".mp3".to_string(),
        Some("audio/wav") => ".wav".to_string(),
        _ => file_name
            .map(Path::new)
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| ".mp3".to_string()),
    }
}

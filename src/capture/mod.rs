//! Media capture: turns a user-selected file into an upload payload.
//!
//! The adapter only resolves local files; where they came from (camera roll,
//! document picker, a recorder) is outside the crate.

pub mod image;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use self::image::{encode_jpeg, JpegOptions};

/// Kind of media a sighting was reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "photo" => Ok(MediaKind::Image),
            "audio" | "sound" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission to access {0} is required!")]
    PermissionDenied(String),
    #[error("No such file: {0}")]
    NotFound(String),
    #[error("Not a regular file: {0}")]
    NotAFile(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    fn from_io(path: &Path, source: std::io::Error) -> Self {
        let display = path.display().to_string();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied(display),
            std::io::ErrorKind::NotFound => CaptureError::NotFound(display),
            _ => CaptureError::Io {
                path: display,
                source,
            },
        }
    }
}

/// A file the user selected, as reported by the picker.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedMedia {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

impl PickedMedia {
    /// Reference stored on image markers.
    pub fn uri(&self) -> String {
        self.path.display().to_string()
    }
}

/// Bytes ready for the multipart `file` field.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

/// Resolve a local file into a [`PickedMedia`], sniffing its MIME type.
pub async fn pick_media(path: impl AsRef<Path>, kind: MediaKind) -> Result<PickedMedia, CaptureError> {
    let path = path.as_ref();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| CaptureError::from_io(path, e))?;
    if !meta.is_file() {
        return Err(CaptureError::NotAFile(path.display().to_string()));
    }

    let mime_type = sniff_mime(path).map(str::to_string);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);

    log::debug!(
        "Picked {} {} ({})",
        kind,
        path.display(),
        mime_type.as_deref().unwrap_or("unknown type")
    );

    Ok(PickedMedia {
        path: path.to_path_buf(),
        kind,
        file_name,
        mime_type,
    })
}

/// Content sniffing first, file extension second.
fn sniff_mime(path: &Path) -> Option<&'static str> {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return Some(kind.mime_type());
    }
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => return None,
    };
    Some(mime)
}

/// Collapse WAV aliases to `audio/wav`; fall back to the picker type, then `audio/wav`.
pub fn normalize_audio_mime(reported: Option<&str>) -> String {
    match reported.map(|m| m.trim().to_ascii_lowercase()) {
        Some(m) if matches!(m.as_str(), "audio/vnd.wave" | "audio/vnd.wav" | "audio/wave" | "audio/x-wav") => {
            "audio/wav".to_string()
        }
        Some(m) if !m.is_empty() => m,
        _ => "audio/wav".to_string(),
    }
}

/// Read the picked file and shape it for upload.
///
/// Photos are re-encoded as JPEG; if decoding fails the original bytes are
/// sent under the `image/jpeg` label anyway.
pub async fn prepare_upload(media: &PickedMedia, jpeg: JpegOptions) -> Result<UploadPayload, CaptureError> {
    let bytes = tokio::fs::read(&media.path)
        .await
        .map_err(|e| CaptureError::from_io(&media.path, e))?;

    match media.kind {
        MediaKind::Image => {
            let bytes = match encode_jpeg(&bytes, jpeg) {
                Ok((encoded, w, h)) => {
                    log::debug!("Photo re-encoded to {}x{} JPEG ({} bytes)", w, h, encoded.len());
                    encoded
                }
                Err(e) => {
                    log::warn!("Sending {} unmodified: {}", media.path.display(), e);
                    bytes
                }
            };
            let file_name = media
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|stem| format!("{stem}.jpg"))
                .unwrap_or_else(|| "image.jpg".to_string());
            Ok(UploadPayload {
                bytes,
                file_name,
                mime_type: "image/jpeg".to_string(),
            })
        }
        MediaKind::Audio => Ok(UploadPayload {
            bytes,
            file_name: media
                .file_name
                .clone()
                .unwrap_or_else(|| "audiofile.wav".to_string()),
            mime_type: normalize_audio_mime(media.mime_type.as_deref()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn wav_aliases_collapse() {
        assert_eq!(normalize_audio_mime(Some("audio/vnd.wave")), "audio/wav");
        assert_eq!(normalize_audio_mime(Some("audio/x-wav")), "audio/wav");
        assert_eq!(normalize_audio_mime(Some("audio/mpeg")), "audio/mpeg");
        assert_eq!(normalize_audio_mime(None), "audio/wav");
        assert_eq!(normalize_audio_mime(Some("")), "audio/wav");
    }

    #[test]
    fn media_kind_parses() {
        assert_eq!("Image".parse::<MediaKind>().unwrap(), MediaKind::Image);
        assert_eq!("audio".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert!("video".parse::<MediaKind>().is_err());
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }

    #[tokio::test]
    async fn pick_missing_file() {
        let err = pick_media("/nonexistent/roar.wav", MediaKind::Audio)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::NotFound(_)));
    }

    #[tokio::test]
    async fn audio_payload_uses_extension_type() {
        let mut file = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        file.write_all(b"not really audio").unwrap();

        let picked = pick_media(file.path(), MediaKind::Audio).await.unwrap();
        assert_eq!(picked.mime_type.as_deref(), Some("audio/mpeg"));

        let payload = prepare_upload(&picked, JpegOptions::default()).await.unwrap();
        assert_eq!(payload.mime_type, "audio/mpeg");
        assert_eq!(payload.bytes, b"not really audio");
        assert!(payload.file_name.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn undecodable_photo_is_sent_raw_as_jpeg() {
        let mut file = tempfile::Builder::new().suffix(".heic").tempfile().unwrap();
        file.write_all(b"opaque").unwrap();

        let picked = pick_media(file.path(), MediaKind::Image).await.unwrap();
        let payload = prepare_upload(&picked, JpegOptions::default()).await.unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.bytes, b"opaque");
        assert!(payload.file_name.ends_with(".jpg"));
    }
}

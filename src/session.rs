// session.rs: Drives capture, upload and the report store for one run of
// the field client.
//
// A session is created at process start and dropped at exit. The device
// location is resolved once on start; every successful reply that echoes
// coordinates becomes a marker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::capture::image::JpegOptions;
use crate::capture::{prepare_upload, MediaKind, PickedMedia, UploadPayload};
use crate::client::{UploadClient, UPLOAD_FAILED_MESSAGE};
use crate::location::{locate_once, Coordinates, LocationProvider};
use crate::reports::{
    export_snapshot, local_timestamp, DocumentSink, ExportError, Marker, NewMarker, ReportStore,
};
use crate::speech::Speaker;

/// Outcome of one submission as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Analysis text, or the user-facing failure message.
    pub message: String,
    /// The marker plotted for this submission, if the reply carried coordinates.
    pub marker: Option<Marker>,
    pub failed: bool,
}

impl Submission {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            marker: None,
            failed: true,
        }
    }
}

pub struct FieldSession {
    client: UploadClient,
    speaker: Arc<dyn Speaker>,
    jpeg: JpegOptions,
    location: Result<Coordinates, String>,
    store: TokioMutex<ReportStore>,
    active_filter: TokioMutex<MediaKind>,
    /// Advisory only: a second submission is logged, not refused.
    uploading: AtomicBool,
}

/// Clears the uploading flag on every exit path of `submit`.
struct UploadingFlag<'a>(&'a AtomicBool);

impl Drop for UploadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FieldSession {
    /// Start a session, resolving the device location once.
    pub async fn start(
        client: UploadClient,
        speaker: Arc<dyn Speaker>,
        location_provider: &dyn LocationProvider,
        jpeg: JpegOptions,
    ) -> Self {
        let location = locate_once(location_provider)
            .await
            .map_err(|e| e.to_string());
        log::info!("Field session started");
        Self {
            client,
            speaker,
            jpeg,
            location,
            store: TokioMutex::new(ReportStore::new()),
            active_filter: TokioMutex::new(MediaKind::Image),
            uploading: AtomicBool::new(false),
        }
    }

    pub fn location(&self) -> Option<Coordinates> {
        self.location.as_ref().ok().copied()
    }

    /// One-line location banner.
    pub fn location_status(&self) -> String {
        match &self.location {
            Ok(c) => format!(
                "Latitude: {:.5}, Longitude: {:.5}",
                c.latitude, c.longitude
            ),
            Err(msg) => msg.clone(),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    /// Upload one picked file and record the result.
    pub async fn submit(&self, media: &PickedMedia) -> Submission {
        if self.uploading.swap(true, Ordering::SeqCst) {
            log::warn!("Submission started while another upload is in flight");
        }
        let _flag = UploadingFlag(&self.uploading);

        self.speaker.stop().await;

        let submission = match prepare_upload(media, self.jpeg).await {
            Ok(payload) => self.upload(media, payload).await,
            Err(e) => {
                log::error!("Could not read {}: {}", media.path.display(), e);
                Submission::failure(UPLOAD_FAILED_MESSAGE)
            }
        };

        if let Err(e) = self.speaker.speak(&submission.message).await {
            log::warn!("Speech unavailable: {}", e);
        }
        submission
    }

    async fn upload(&self, media: &PickedMedia, payload: UploadPayload) -> Submission {
        let coordinates = self.location();
        let result = self.client.submit(payload, media.kind, coordinates).await;

        match result {
            Ok(reply) => {
                let marker = match reply.coordinates() {
                    Some(coords) => {
                        let new = NewMarker {
                            coordinates: coords,
                            kind: media.kind,
                            analysis: reply.analysis.clone(),
                            uri: (media.kind == MediaKind::Image).then(|| media.uri()),
                        };
                        let mut store = self.store.lock().await;
                        Some(store.append(new, local_timestamp()).clone())
                    }
                    None => None,
                };
                Submission {
                    message: reply.analysis,
                    marker,
                    failed: false,
                }
            }
            Err(e) => {
                log::error!("Upload failed: {}", e);
                Submission::failure(e.user_message())
            }
        }
    }

    pub async fn set_filter(&self, kind: MediaKind) {
        *self.active_filter.lock().await = kind;
    }

    pub async fn active_filter(&self) -> MediaKind {
        *self.active_filter.lock().await
    }

    /// The markers the map shows under the active filter.
    pub async fn filtered(&self) -> Vec<Marker> {
        let kind = self.active_filter().await;
        self.filter(kind).await
    }

    pub async fn filter(&self, kind: MediaKind) -> Vec<Marker> {
        self.store
            .lock()
            .await
            .filter(kind)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> Vec<Marker> {
        self.store.lock().await.snapshot().to_vec()
    }

    /// Export every marker through `sink`.
    pub async fn export(&self, sink: &dyn DocumentSink) -> Result<std::path::PathBuf, ExportError> {
        let store = self.store.lock().await;
        export_snapshot(store.snapshot(), sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedLocation, NoLocation};
    use crate::speech::SilentSpeaker;

    async fn session(provider: &dyn LocationProvider) -> FieldSession {
        FieldSession::start(
            UploadClient::new("http://127.0.0.1:9").unwrap(),
            Arc::new(SilentSpeaker),
            provider,
            JpegOptions::default(),
        )
        .await
    }

    #[tokio::test]
    async fn session_starts_empty_with_image_filter() {
        let s = session(&NoLocation).await;
        assert!(s.snapshot().await.is_empty());
        assert_eq!(s.active_filter().await, MediaKind::Image);
        assert!(!s.is_uploading());
    }

    #[tokio::test]
    async fn location_banner() {
        let s = session(&FixedLocation::new(Coordinates {
            latitude: 12.345678,
            longitude: -98.7654321,
        }))
        .await;
        assert_eq!(s.location_status(), "Latitude: 12.34568, Longitude: -98.76543");

        let s = session(&NoLocation).await;
        assert_eq!(s.location(), None);
        assert_eq!(s.location_status(), "Permission to access location was denied");
    }

    #[tokio::test]
    async fn export_without_reports() {
        let s = session(&NoLocation).await;
        let sink = crate::reports::PdfFileSink::new("/nonexistent/never-written.pdf");
        assert!(matches!(s.export(&sink).await, Err(ExportError::NoReports)));
    }
}

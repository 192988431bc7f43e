//! End-to-end tests for FieldSession: real relay router on a loopback port,
//! scripted provider upstream, recording speaker. Deterministic, no API key.
//!
//! Run: cargo test --test session_test

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use wildwatch_lib::ai::{AiError, AiProvider};
use wildwatch_lib::capture::image::JpegOptions;
use wildwatch_lib::capture::{pick_media, MediaKind};
use wildwatch_lib::client::{UploadClient, UPLOAD_FAILED_MESSAGE};
use wildwatch_lib::location::{Coordinates, FixedLocation, LocationProvider, NoLocation};
use wildwatch_lib::relay::{build_router, AppState, UNCLEAR_AUDIO_MESSAGE};
use wildwatch_lib::reports::{HtmlFileSink, PdfFileSink};
use wildwatch_lib::session::FieldSession;
use wildwatch_lib::settings::Settings;
use wildwatch_lib::speech::{SpeechError, Speaker};

// ---------------------------------------------------------------------------
// Mock implementations
// ---------------------------------------------------------------------------

struct ScriptedProvider {
    transcript: &'static str,
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn analyze_image(&self, _jpeg_base64: &str, _prompt: &str) -> Result<String, AiError> {
        Ok("The animal is not in distress".into())
    }

    async fn transcribe(&self, _audio_path: &Path, _mime_type: &str) -> Result<String, AiError> {
        Ok(self.transcript.into())
    }

    async fn complete_text(&self, _instruction: &str, _user_content: &str) -> Result<String, AiError> {
        Ok("The animal is in distress".into())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingSpeaker {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.events.lock().unwrap().push(format!("speak:{text}"));
        Ok(())
    }

    async fn stop(&self) {
        self.events.lock().unwrap().push("stop".into());
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const HERE: Coordinates = Coordinates {
    latitude: 12.34567,
    longitude: -98.76543,
};

/// Serve the relay on an ephemeral port and return its base URL.
async fn spawn_relay(transcript: &'static str, upload_dir: &Path) -> String {
    let mut config = Settings::default().relay_config();
    config.upload_dir = upload_dir.to_path_buf();
    let app = build_router(AppState::new(Arc::new(ScriptedProvider { transcript }), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn session_with(
    base_url: &str,
    location: &dyn LocationProvider,
) -> (FieldSession, Arc<RecordingSpeaker>) {
    let speaker = Arc::new(RecordingSpeaker::default());
    let session = FieldSession::start(
        UploadClient::new(base_url).unwrap(),
        speaker.clone(),
        location,
        JpegOptions::default(),
    )
    .await;
    (session, speaker)
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Each successful upload appends exactly one marker, in submission order.
#[tokio::test]
async fn uploads_become_markers_in_order() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("the lion is roaring loudly and pacing", staging.path()).await;
    let (session, _) = session_with(&url, &FixedLocation::new(HERE)).await;

    let photo = write_file(media.path(), "elephant.jpg", b"not really a jpeg");
    let clip = write_file(media.path(), "roar.wav", b"RIFF....WAVEfmt ");

    for (path, kind) in [
        (&photo, MediaKind::Image),
        (&clip, MediaKind::Audio),
        (&photo, MediaKind::Image),
    ] {
        let picked = pick_media(path, kind).await.unwrap();
        let submission = session.submit(&picked).await;
        assert!(!submission.failed, "{}", submission.message);
        assert!(submission.marker.is_some());
    }

    let markers = session.snapshot().await;
    assert_eq!(markers.len(), 3);
    let ids: Vec<u64> = markers.iter().map(|m| m.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(markers[0].analysis, "The animal is not in distress");
    assert_eq!(markers[1].analysis, "The animal is in distress");
    assert!(markers[0].uri.is_some());
    assert!(markers[1].uri.is_none());
    assert!(!session.is_uploading());
}

/// The image and audio filters partition the markers.
#[tokio::test]
async fn filters_partition_markers() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("the elephant trumpets again and again", staging.path()).await;
    let (session, _) = session_with(&url, &FixedLocation::new(HERE)).await;

    let photo = write_file(media.path(), "rhino.jpg", b"jpeg-ish");
    let clip = write_file(media.path(), "call.mp3", b"ID3 fake");
    for (path, kind) in [
        (&photo, MediaKind::Image),
        (&clip, MediaKind::Audio),
        (&clip, MediaKind::Audio),
    ] {
        session.submit(&pick_media(path, kind).await.unwrap()).await;
    }

    let images = session.filter(MediaKind::Image).await;
    let audio = session.filter(MediaKind::Audio).await;
    assert_eq!(images.len(), 1);
    assert_eq!(audio.len(), 2);
    assert_eq!(images.len() + audio.len(), session.snapshot().await.len());

    assert_eq!(session.filtered().await, images);
    session.set_filter(MediaKind::Audio).await;
    assert_eq!(session.filtered().await, audio);
}

/// Echoed coordinates round-trip to five-decimal display.
#[tokio::test]
async fn marker_coordinates_display_five_decimals() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("unused", staging.path()).await;
    let (session, _) = session_with(&url, &FixedLocation::new(HERE)).await;

    let photo = write_file(media.path(), "zebra.jpg", b"jpeg-ish");
    let submission = session
        .submit(&pick_media(&photo, MediaKind::Image).await.unwrap())
        .await;
    let marker = submission.marker.unwrap();
    assert_eq!(marker.coordinates().display(), "12.34567, -98.76543");
}

/// Without a location the analysis is still shown but nothing is plotted.
#[tokio::test]
async fn no_location_means_no_markers() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("unused", staging.path()).await;
    let (session, speaker) = session_with(&url, &NoLocation).await;

    let photo = write_file(media.path(), "lion.jpg", b"jpeg-ish");
    let submission = session
        .submit(&pick_media(&photo, MediaKind::Image).await.unwrap())
        .await;

    assert_eq!(submission.message, "The animal is not in distress");
    assert!(submission.marker.is_none());
    assert!(session.snapshot().await.is_empty());
    assert_eq!(
        speaker.events.lock().unwrap().last().unwrap(),
        "speak:The animal is not in distress"
    );
}

/// Rejected audio is spoken but never plotted.
#[tokio::test]
async fn unclear_audio_is_not_plotted() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("42.0 cm", staging.path()).await;
    let (session, _) = session_with(&url, &FixedLocation::new(HERE)).await;

    let clip = write_file(media.path(), "noise.wav", b"RIFF....WAVE");
    let submission = session
        .submit(&pick_media(&clip, MediaKind::Audio).await.unwrap())
        .await;

    assert_eq!(submission.message, UNCLEAR_AUDIO_MESSAGE);
    assert!(submission.marker.is_none());
    assert!(session.snapshot().await.is_empty());
}

/// A dead backend yields the generic failure text, spoken after the stop.
#[tokio::test]
async fn network_failure_is_reported_generically() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let media = tempfile::tempdir().unwrap();
    let (session, speaker) = session_with(&url, &FixedLocation::new(HERE)).await;

    let photo = write_file(media.path(), "hyena.jpg", b"jpeg-ish");
    let submission = session
        .submit(&pick_media(&photo, MediaKind::Image).await.unwrap())
        .await;

    assert!(submission.failed);
    assert_eq!(submission.message, UPLOAD_FAILED_MESSAGE);
    assert!(session.snapshot().await.is_empty());
    assert!(!session.is_uploading());
    assert_eq!(
        *speaker.events.lock().unwrap(),
        vec![
            "stop".to_string(),
            format!("speak:{UPLOAD_FAILED_MESSAGE}")
        ]
    );
}

/// A file that vanished after picking still ends in a spoken failure.
#[tokio::test]
async fn unreadable_file_is_spoken_as_failure() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("the lion is roaring loudly and pacing", staging.path()).await;
    let (session, speaker) = session_with(&url, &FixedLocation::new(HERE)).await;

    let clip = write_file(media.path(), "roar.wav", b"RIFF....WAVE");
    let picked = pick_media(&clip, MediaKind::Audio).await.unwrap();
    std::fs::remove_file(&clip).unwrap();

    let submission = session.submit(&picked).await;

    assert!(submission.failed);
    assert_eq!(submission.message, UPLOAD_FAILED_MESSAGE);
    assert!(submission.marker.is_none());
    assert!(session.snapshot().await.is_empty());
    assert!(!session.is_uploading());
    assert_eq!(
        *speaker.events.lock().unwrap(),
        vec![
            "stop".to_string(),
            format!("speak:{UPLOAD_FAILED_MESSAGE}")
        ]
    );
}

/// Export writes every marker; an empty session exports nothing.
#[tokio::test]
async fn export_writes_all_reports() {
    let staging = tempfile::tempdir().unwrap();
    let media = tempfile::tempdir().unwrap();
    let url = spawn_relay("the lion is roaring loudly and pacing", staging.path()).await;
    let (session, _) = session_with(&url, &FixedLocation::new(HERE)).await;

    let sink = HtmlFileSink::new(media.path().join("report.html"));
    assert!(session.export(&sink).await.is_err());

    let photo = write_file(media.path(), "gorilla.jpg", b"jpeg-ish");
    let clip = write_file(media.path(), "call.wav", b"RIFF....WAVE");
    session
        .submit(&pick_media(&photo, MediaKind::Image).await.unwrap())
        .await;
    session
        .submit(&pick_media(&clip, MediaKind::Audio).await.unwrap())
        .await;

    let written = session.export(&sink).await.unwrap();
    let html = std::fs::read_to_string(written).unwrap();
    assert!(html.contains("Wildlife Sightings Report"));
    assert!(html.contains("Image Report"));
    assert!(html.contains("Audio Report"));
    assert!(html.contains("12.34567, -98.76543"));

    let pdf = PdfFileSink::new(media.path().join("report.pdf"));
    let written = session.export(&pdf).await.unwrap();
    assert!(std::fs::read(written).unwrap().starts_with(b"%PDF"));
}

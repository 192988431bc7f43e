use axum::extract::{Multipart, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::ai::AiError;

use super::staging::{audio_extension, read_upload_form};
use super::transcript::{Verdict, UNCLEAR_AUDIO_MESSAGE};
use super::{AnalysisReply, AppState, CoordinateEcho, RelayError};

/// `GET /test`: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /analyze`: photo assessment.
///
/// # Multipart Fields
/// - `file`: the photo (required)
/// - `latitude`, `longitude`: decimal strings, both or neither
///
/// # Returns
/// - 200 OK with `{ analysis, latitude, longitude }`
/// - 400 Bad Request if the file is missing or the coordinates are malformed
/// - 500 Internal Server Error with `details` if the model call fails
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisReply>, RelayError> {
    let form = read_upload_form(multipart, &state.config.upload_dir).await?;
    let staged = form.file.ok_or(RelayError::MissingFile("No file uploaded"))?;
    let echo = CoordinateEcho::validate(form.latitude, form.longitude)?;
    log::debug!("analyze: validated {}", staged.path().display());

    let data = tokio::fs::read(staged.path())
        .await
        .map_err(RelayError::Storage)?;

    log::debug!(
        "analyze: forwarding {} bytes to {}",
        data.len(),
        state.provider.name()
    );
    let analysis = state
        .provider
        .analyze_image(&BASE64.encode(&data), &state.config.image_prompt)
        .await
        .map_err(|e| {
            log::error!("Error analyzing image: {}", e);
            RelayError::Upstream {
                context: "Failed to analyze image",
                source: e,
            }
        })?;

    drop(staged);
    log::info!("analyze: {} chars of analysis returned", analysis.len());
    Ok(Json(echo.reply(analysis)))
}

/// `POST /analyze-audio`: transcribe a recording, then classify it unless the transcript is rejected.
///
/// Same fields and status codes as [`analyze_image`]. Rejected transcripts
/// get the fixed unclear-audio reply without coordinates, so no marker is
/// plotted for them.
pub async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisReply>, RelayError> {
    let form = read_upload_form(multipart, &state.config.upload_dir).await?;
    let mut staged = form
        .file
        .ok_or(RelayError::MissingFile("No audio file uploaded"))?;
    let echo = CoordinateEcho::validate(form.latitude, form.longitude)?;

    let ext = audio_extension(staged.content_type.as_deref(), staged.file_name.as_deref());
    staged
        .rename_with_extension(&ext)
        .await
        .map_err(RelayError::Storage)?;

    let mime_type = staged
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let upstream = |e: AiError| {
        log::error!("Error analyzing audio: {}", e);
        RelayError::Upstream {
            context: "Failed to analyze audio",
            source: e,
        }
    };

    let transcript = state
        .provider
        .transcribe(staged.path(), &mime_type)
        .await
        .map_err(upstream)?;
    log::debug!("analyze-audio: transcript {:?}", transcript.trim());

    if let Verdict::Rejected(reason) = state.config.transcript_policy.evaluate(&transcript) {
        log::info!("analyze-audio: transcript rejected ({:?})", reason);
        drop(staged);
        return Ok(Json(AnalysisReply {
            analysis: UNCLEAR_AUDIO_MESSAGE.to_string(),
            latitude: None,
            longitude: None,
        }));
    }

    let analysis = state
        .provider
        .complete_text(
            &state.config.audio_instruction,
            &format!("Animal vocalization transcription: {}", transcript),
        )
        .await
        .map_err(upstream)?;

    drop(staged);
    log::info!("analyze-audio: classified as {:?}", analysis);
    Ok(Json(echo.reply(analysis)))
}

//! The relay backend: a stateless HTTP service that stages uploaded media,
//! forwards it to the hosted AI provider with a fixed prompt and returns the
//! model text with the request's coordinates echoed back.

pub mod handlers;
pub mod staging;
pub mod transcript;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::ai::{AiError, AiProvider};
use crate::location::{CoordinateError, Coordinates};
pub use transcript::{TranscriptPolicy, Verdict, UNCLEAR_AUDIO_MESSAGE};

/// Everything a request handler needs besides the provider.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub image_prompt: String,
    pub audio_instruction: String,
    pub transcript_policy: TranscriptPolicy,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn AiProvider>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(provider: Arc<dyn AiProvider>, config: RelayConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }
}

/// Build the relay router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/test", get(handlers::health))
        .route("/analyze", post(handlers::analyze_image))
        .route("/analyze-audio", post(handlers::analyze_audio))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create the upload directory if it does not exist yet.
pub async fn ensure_upload_dir(config: &RelayConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    log::info!("Staging uploads in {}", config.upload_dir.display());
    Ok(())
}

/// Successful reply of both analyze endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReply {
    pub analysis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
}

/// Coordinates from the form, validated but kept as the client sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateEcho {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl CoordinateEcho {
    pub fn validate(
        latitude: Option<String>,
        longitude: Option<String>,
    ) -> Result<Self, CoordinateError> {
        let present = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        match (present(latitude), present(longitude)) {
            (None, None) => Ok(Self::default()),
            (Some(lat), Some(lon)) => {
                Coordinates::parse(&lat, &lon)?;
                Ok(Self {
                    latitude: Some(lat),
                    longitude: Some(lon),
                })
            }
            _ => Err(CoordinateError::Unpaired),
        }
    }

    pub fn reply(self, analysis: String) -> AnalysisReply {
        AnalysisReply {
            analysis,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Error type for relay handlers
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    MissingFile(&'static str),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(#[from] CoordinateError),
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Storage error: {0}")]
    Storage(#[source] std::io::Error),
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        source: AiError,
    },
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            RelayError::MissingFile(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            RelayError::InvalidCoordinates(e) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Invalid coordinates", "details": e.to_string() }),
            ),
            RelayError::Multipart(details) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Malformed upload", "details": details }),
            ),
            RelayError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "Failed to store upload", "details": e.to_string() }),
            ),
            RelayError::Upstream { context, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": context, "details": source.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_keeps_strings_verbatim() {
        let echo =
            CoordinateEcho::validate(Some("12.34567".into()), Some(" -98.76543".into())).unwrap();
        assert_eq!(echo.latitude.as_deref(), Some("12.34567"));
        assert_eq!(echo.longitude.as_deref(), Some("-98.76543"));
    }

    #[test]
    fn echo_absent_is_fine() {
        assert_eq!(
            CoordinateEcho::validate(None, Some("  ".into())).unwrap(),
            CoordinateEcho::default()
        );
    }

    #[test]
    fn echo_rejects_half_pairs_and_garbage() {
        assert_eq!(
            CoordinateEcho::validate(Some("1.0".into()), None).unwrap_err(),
            CoordinateError::Unpaired
        );
        assert!(CoordinateEcho::validate(Some("1.0".into()), Some("east".into())).is_err());
    }

    #[test]
    fn reply_omits_missing_coordinates() {
        let reply = CoordinateEcho::default().reply("ok".into());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json, serde_json::json!({ "analysis": "ok" }));
    }

    #[test]
    fn missing_file_maps_to_bad_request() {
        let response = RelayError::MissingFile("No file uploaded").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_failure_maps_to_internal_error() {
        let response = RelayError::Upstream {
            context: "Failed to analyze image",
            source: AiError::ModelError("overloaded".into()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// client.rs: Upload client: packages a prepared payload plus coordinates into
// a multipart request for the relay and parses the JSON reply.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::ai::NO_ANALYSIS;
use crate::capture::{MediaKind, UploadPayload};
use crate::location::Coordinates;

/// The only thing a user ever sees when an upload fails.
pub const UPLOAD_FAILED_MESSAGE: &str = "Error uploading file.";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid backend URL: {0}")]
    BadUrl(#[from] url::ParseError),
    #[error("Request failed: {0}")]
    Network(String),
    #[error("Unreadable reply: {0}")]
    Parse(String),
}

impl UploadError {
    /// Generic user-facing text; details stay in the log.
    pub fn user_message(&self) -> &'static str {
        UPLOAD_FAILED_MESSAGE
    }
}

/// Reply body of both relay endpoints, success or failure.
#[derive(Debug, Clone, Default, Deserialize)]
struct RelayResponse {
    analysis: Option<String>,
    error: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

/// What the relay said about one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub analysis: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl AnalysisResult {
    /// Parse the echoed coordinates; `None` unless both are present and numeric.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let lat = self.latitude.as_deref()?.trim();
        let lon = self.longitude.as_deref()?.trim();
        if lat.is_empty() || lon.is_empty() {
            return None;
        }
        match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) if latitude.is_finite() && longitude.is_finite() => {
                Some(Coordinates {
                    latitude,
                    longitude,
                })
            }
            _ => {
                log::warn!("Ignoring unparseable coordinates {:?}, {:?}", lat, lon);
                None
            }
        }
    }
}

impl From<RelayResponse> for AnalysisResult {
    fn from(r: RelayResponse) -> Self {
        Self {
            analysis: r
                .analysis
                .or(r.error)
                .unwrap_or_else(|| NO_ANALYSIS.to_string()),
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

pub struct UploadClient {
    base_url: Url,
    client: Client,
}

impl UploadClient {
    pub fn new(base_url: &str) -> Result<Self, UploadError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            client: Client::new(),
        })
    }

    pub fn endpoint(&self, kind: MediaKind) -> Result<Url, UploadError> {
        let path = match kind {
            MediaKind::Image => "analyze",
            MediaKind::Audio => "analyze-audio",
        };
        Ok(self.base_url.join(path)?)
    }

    /// Post one file. Never retries.
    pub async fn submit(
        &self,
        payload: UploadPayload,
        kind: MediaKind,
        coordinates: Option<Coordinates>,
    ) -> Result<AnalysisResult, UploadError> {
        let url = self.endpoint(kind)?;

        let part = Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(&payload.mime_type)
            .map_err(|e| UploadError::Network(format!("bad MIME type: {e}")))?;
        let mut form = Form::new().part("file", part);
        if let Some(c) = coordinates {
            form = form
                .text("latitude", c.latitude.to_string())
                .text("longitude", c.longitude.to_string());
        }

        log::info!("Uploading {} to {}", kind, url);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body: RelayResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Parse(format!("HTTP {status}: {e}")))?;
        if !status.is_success() {
            log::warn!("Relay answered {}: {:?}", status, body.error);
        }
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(lat: Option<&str>, lon: Option<&str>) -> AnalysisResult {
        AnalysisResult {
            analysis: "ok".into(),
            latitude: lat.map(String::from),
            longitude: lon.map(String::from),
        }
    }

    #[test]
    fn endpoints_follow_media_kind() {
        let client = UploadClient::new("http://10.0.0.2:3000").unwrap();
        assert_eq!(
            client.endpoint(MediaKind::Image).unwrap().as_str(),
            "http://10.0.0.2:3000/analyze"
        );
        assert_eq!(
            client.endpoint(MediaKind::Audio).unwrap().as_str(),
            "http://10.0.0.2:3000/analyze-audio"
        );
    }

    #[test]
    fn endpoints_keep_a_base_path() {
        let client = UploadClient::new("https://relay.example.org/wildwatch").unwrap();
        assert_eq!(
            client.endpoint(MediaKind::Audio).unwrap().as_str(),
            "https://relay.example.org/wildwatch/analyze-audio"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            UploadClient::new("not a url"),
            Err(UploadError::BadUrl(_))
        ));
    }

    #[test]
    fn reply_text_falls_back_to_error_then_default() {
        let r: AnalysisResult = RelayResponse {
            error: Some("No file uploaded".into()),
            ..Default::default()
        }
        .into();
        assert_eq!(r.analysis, "No file uploaded");

        let r: AnalysisResult = RelayResponse::default().into();
        assert_eq!(r.analysis, NO_ANALYSIS);
    }

    #[test]
    fn coordinates_need_both_numbers() {
        assert_eq!(
            result(Some("12.34567"), Some("-98.76543")).coordinates(),
            Some(Coordinates {
                latitude: 12.34567,
                longitude: -98.76543
            })
        );
        assert_eq!(result(Some("12.3"), None).coordinates(), None);
        assert_eq!(result(Some(""), Some("1")).coordinates(), None);
        assert_eq!(result(Some("north"), Some("1")).coordinates(), None);
    }

    #[test]
    fn failures_share_one_user_message() {
        let err = UploadError::Network("connection refused".into());
        assert_eq!(err.user_message(), UPLOAD_FAILED_MESSAGE);
    }
}

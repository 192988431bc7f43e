use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ai::ProviderConfig;
use crate::capture::image::JpegOptions;
use crate::location::Coordinates;
use crate::relay::{RelayConfig, TranscriptPolicy};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "wildwatch.toml";

/// Consulted when `provider.apiKey` is empty.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_IMAGE_PROMPT: &str = "You are a wildlife expert specializing in animal behavior and health. Analyze the animal shown and first say either The animal is in distress! OR say The animal is not in distress Then describe why their behavior or condition appears normal or abnormal. Explain your reasoning very briefly and in plain language.";

pub const DEFAULT_AUDIO_INSTRUCTION: &str = "You are a wildlife expert. Respond with only one of the following: This behavior is normal, no distress recognized. OR This behavior is abnormal, the animal is in distress!";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub relay: RelaySettings,
    pub provider: ProviderSettings,
    pub transcript_policy: TranscriptPolicy,
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub bind: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
            upload_dir: PathBuf::from("./uploads"),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_key: String,
    pub use_bearer: bool,
    pub vision_model: String,
    pub transcription_model: String,
    pub classification_model: String,
    pub max_tokens: u32,
    pub classification_temperature: f32,
    pub image_prompt: String,
    pub audio_instruction: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            use_bearer: true,
            vision_model: "gpt-4o".into(),
            transcription_model: "whisper-1".into(),
            classification_model: "gpt-4o".into(),
            max_tokens: 300,
            classification_temperature: 0.5,
            image_prompt: DEFAULT_IMAGE_PROMPT.into(),
            audio_instruction: DEFAULT_AUDIO_INSTRUCTION.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub backend_url: String,
    pub image_max_width: u32,
    pub jpeg_quality: u8,
    /// Text-to-speech program; the text is passed as its last argument. Empty disables speech.
    pub speech_command: String,
    pub speech_args: Vec<String>,
    /// Fixed device position; no position means location is unavailable.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:3000".into(),
            image_max_width: 2048,
            jpeg_quality: 90,
            speech_command: "espeak".into(),
            speech_args: Vec::new(),
            latitude: None,
            longitude: None,
        }
    }
}

impl Settings {
    /// Load from `path`, or from `wildwatch.toml` in the working directory, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(p) => Self::load_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_file(default_path)?
                } else {
                    log::info!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        if settings.provider.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                settings.provider.api_key = key;
            }
        }
        Ok(settings)
    }

    fn load_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = self.to_toml()?;
        fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let p = &self.provider;
        ProviderConfig {
            endpoint: p.endpoint.clone(),
            api_key: p.api_key.clone(),
            use_bearer: p.use_bearer,
            vision_model: p.vision_model.clone(),
            transcription_model: p.transcription_model.clone(),
            classification_model: p.classification_model.clone(),
            max_tokens: p.max_tokens,
            classification_temperature: p.classification_temperature,
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            upload_dir: self.relay.upload_dir.clone(),
            max_upload_bytes: self.relay.max_upload_bytes,
            image_prompt: self.provider.image_prompt.clone(),
            audio_instruction: self.provider.audio_instruction.clone(),
            transcript_policy: self.transcript_policy.clone(),
        }
    }

    pub fn jpeg_options(&self) -> JpegOptions {
        JpegOptions {
            max_width: self.client.image_max_width,
            quality: self.client.jpeg_quality,
        }
    }

    /// The configured device position, if both components are set.
    pub fn fixed_location(&self) -> Option<Coordinates> {
        match (self.client.latitude, self.client.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

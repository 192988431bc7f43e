use serde::{Deserialize, Serialize};

/// Reply used when the model returns no choices or no message content.
pub const NO_ANALYSIS: &str = "No analysis returned.";

/// A chat message sent to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Error type for AI operations
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),
    #[error("Authentication failed: {0}")]
    AuthError(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Model error: {0}")]
    ModelError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Media read failed: {0}")]
    Media(#[from] std::io::Error),
}

/// Model parameters shared by every request the relay makes upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub use_bearer: bool,
    pub vision_model: String,
    pub transcription_model: String,
    pub classification_model: String,
    pub max_tokens: u32,
    pub classification_temperature: f32,
}

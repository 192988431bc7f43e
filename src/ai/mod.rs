use async_trait::async_trait;
use std::path::Path;

pub mod openai;
pub mod types;
pub use types::*;

/// Trait for hosted AI providers (OpenAI, Azure OpenAI, compatible gateways).
/// The relay only ever talks to the upstream through this seam.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Describe a photo.
    /// `jpeg_base64` is the base64-encoded image, `prompt` the fixed assessment prompt.
    async fn analyze_image(&self, jpeg_base64: &str, prompt: &str) -> Result<String, AiError>;

    /// Transcribe the audio file at `audio_path` to plain text.
    /// The upstream picks its decoder from the file extension, so the path must carry one.
    async fn transcribe(&self, audio_path: &Path, mime_type: &str) -> Result<String, AiError>;

    /// Run a text-only completion restricted by `instruction`.
    async fn complete_text(&self, instruction: &str, user_content: &str)
        -> Result<String, AiError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

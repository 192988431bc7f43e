use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::path::Path;

use super::{AiError, AiProvider, ChatMessage, ProviderConfig, NO_ANALYSIS};

/// Client for OpenAI-compatible chat completion and transcription endpoints.
pub struct OpenAiClient {
    endpoint: String,
    api_key: String,
    vision_model: String,
    transcription_model: String,
    classification_model: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
    /// When false, send the key in an `api-key` header (Azure) instead of `Authorization: Bearer`.
    use_bearer: bool,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            vision_model: config.vision_model.clone(),
            transcription_model: config.transcription_model.clone(),
            classification_model: config.classification_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.classification_temperature,
            client: Client::new(),
            use_bearer: config.use_bearer,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        if self.use_bearer {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        } else {
            req.header("api-key", &self.api_key)
        }
    }

    fn build_image_body(&self, jpeg_base64: &str, prompt: &str) -> Value {
        json!({
            "model": self.vision_model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/jpeg;base64,{}", jpeg_base64) }
                        }
                    ]
                }
            ],
            "max_tokens": self.max_tokens
        })
    }

    fn build_text_body(&self, instruction: &str, user_content: &str) -> Value {
        let messages = [ChatMessage::system(instruction), ChatMessage::user(user_content)];
        json!({
            "model": self.classification_model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    async fn post_chat(&self, body: &Value) -> Result<String, AiError> {
        let req = self
            .client
            .post(self.url("chat/completions"))
            .header("Content-Type", "application/json");

        let response = self
            .authorize(req)
            .json(body)
            .send()
            .await
            .map_err(|e| AiError::ConnectionError(e.to_string()))?;

        let parsed: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("Invalid completion JSON: {}", e)))?;

        Ok(extract_message_content(&parsed))
    }
}

/// Map non-success statuses onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error body".into());

    match status.as_u16() {
        401 | 403 => Err(AiError::AuthError(error_body)),
        429 => Err(AiError::RateLimited {
            retry_after_ms: 1000,
        }),
        _ => Err(AiError::ConnectionError(format!(
            "HTTP {}: {}",
            status, error_body
        ))),
    }
}

/// Pull `choices[0].message.content` out of a completion reply.
fn extract_message_content(parsed: &Value) -> String {
    parsed
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .unwrap_or(NO_ANALYSIS)
        .to_string()
}

#[async_trait]
impl AiProvider for OpenAiClient {
    async fn analyze_image(&self, jpeg_base64: &str, prompt: &str) -> Result<String, AiError> {
        let body = self.build_image_body(jpeg_base64, prompt);
        self.post_chat(&body).await
    }

    async fn transcribe(&self, audio_path: &Path, mime_type: &str) -> Result<String, AiError> {
        let audio_data = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str(mime_type)
            .map_err(|e| AiError::InvalidRequest(format!("bad audio MIME type: {}", e)))?;

        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("response_format", "text")
            .part("file", part);

        let req = self.client.post(self.url("audio/transcriptions"));
        let response = self
            .authorize(req)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AiError::ConnectionError(e.to_string()))?;

        check_status(response)
            .await?
            .text()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("Unreadable transcript: {}", e)))
    }

    async fn complete_text(
        &self,
        instruction: &str,
        user_content: &str,
    ) -> Result<String, AiError> {
        let body = self.build_text_body(instruction, user_content);
        self.post_chat(&body).await
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

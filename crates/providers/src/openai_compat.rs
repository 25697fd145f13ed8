//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, Groq, OpenRouter, Together AI, Ollama, vLLM, and any
//! endpoint that speaks the OpenAI REST dialect.
//!
//! One client implements every capability Rose needs:
//! - Chat completions (`/chat/completions`)
//! - Transcription (`/audio/transcriptions`, multipart upload)
//! - Speech synthesis (`/audio/speech`)
//! - Image generation (`/images/generations`)
//! - Embeddings (`/embeddings`)

use async_trait::async_trait;
use base64::Engine;
use rose_core::error::ProviderError;
use rose_core::message::{Message, Role};
use rose_core::provider::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Model names used for each capability.
#[derive(Debug, Clone)]
pub struct ClientModels {
    pub text: String,
    pub stt: String,
    pub tts: String,
    pub voice: String,
    pub image: String,
    pub embedding: String,
}

impl ClientModels {
    pub fn from_config(models: &rose_config::ModelsConfig) -> Self {
        Self {
            text: models.text_model.clone(),
            stt: models.stt_model.clone(),
            tts: models.tts_model.clone(),
            voice: models.tts_voice.clone(),
            image: models.image_model.clone(),
            embedding: models.embedding_model.clone(),
        }
    }
}

/// An OpenAI-compatible HTTP client.
///
/// Timeouts are left to the caller's guard; the client itself only carries
/// a generous transport ceiling.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    models: ClientModels,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: ClientModels,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: m.content.clone(),
            })
            .collect()
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Map a non-success status to the matching provider error.
    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    fn network_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    fn require_key(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.require_key()?;
        let model = request.model.as_deref().unwrap_or(&self.models.text);

        let mut body = serde_json::json!({
            "model": model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(provider = %self.name, model = %model, "Sending completion request");

        let response = self
            .post("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;
        let response = self.check_status(response).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("completion: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, ProviderError> {
        self.require_key()?;
        if audio.is_empty() {
            return Err(ProviderError::MalformedResponse("empty audio input".into()));
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("speech.{}", sniff_audio_extension(audio)));
        let form = reqwest::multipart::Form::new()
            .text("model", self.models.stt.clone())
            .text("response_format", "json")
            .part("file", part);

        debug!(provider = %self.name, model = %self.models.stt, bytes = audio.len(), "Sending transcription request");

        let response = self
            .post("/audio/transcriptions")
            .multipart(form)
            .send()
            .await
            .map_err(Self::network_error)?;
        let response = self.check_status(response).await?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("transcription: {e}")))?;

        let text = body.text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "transcription came back empty".into(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        self.require_key()?;
        let body = serde_json::json!({
            "model": self.models.tts,
            "input": text,
            "voice": self.models.voice,
            "response_format": "mp3",
        });

        debug!(provider = %self.name, model = %self.models.tts, chars = text.len(), "Sending speech request");

        let response = self
            .post("/audio/speech")
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;
        let response = self.check_status(response).await?;

        let bytes = response.bytes().await.map_err(Self::network_error)?;
        if bytes.is_empty() {
            return Err(ProviderError::MalformedResponse("speech came back empty".into()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, ProviderError> {
        self.require_key()?;
        let body = serde_json::json!({
            "model": self.models.image,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
            "response_format": "b64_json",
        });

        debug!(provider = %self.name, model = %self.models.image, "Sending image request");

        let response = self
            .post("/images/generations")
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;
        let response = self.check_status(response).await?;

        let body: ImageApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("image: {e}")))?;

        image_artifact(body)
    }
}

#[async_trait]
impl Embedder for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.require_key()?;

        let body = serde_json::json!({
            "model": self.models.embedding,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %self.models.embedding,
            count = texts.len(),
            "Sending embedding request"
        );

        let response = self
            .post("/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;
        let response = self.check_status(response).await?;

        let api_resp: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("embedding: {e}")))?;

        let mut data = api_resp.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Best-effort container detection so the upload gets a sensible filename.
fn sniff_audio_extension(audio: &[u8]) -> &'static str {
    match audio {
        [b'R', b'I', b'F', b'F', ..] => "wav",
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] => "mp3",
        [b'O', b'g', b'g', b'S', ..] => "ogg",
        [b'f', b'L', b'a', b'C', ..] => "flac",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "webm",
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => "m4a",
        _ => "wav",
    }
}

fn image_artifact(body: ImageApiResponse) -> Result<ImageArtifact, ProviderError> {
    let first = body
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No images in response".into()))?;

    if let Some(b64) = first.b64_json {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .map_err(|e| ProviderError::MalformedResponse(format!("image base64: {e}")))?;
        return Ok(ImageArtifact::Bytes(bytes));
    }
    if let Some(url) = first.url {
        return Ok(ImageArtifact::Path(PathBuf::from(url)));
    }
    Err(ProviderError::MalformedResponse(
        "image entry has neither b64_json nor url".into(),
    ))
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ImageApiResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

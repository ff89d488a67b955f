//! [`LlmDriver`] – OpenAI-compatible chat-completions client.
//!
//! Talks to any server exposing `/v1/chat/completions` (OpenAI, Ollama's
//! compatibility layer, vLLM, …).  Images are sent inline as
//! `data:image/jpeg;base64,…` URLs inside `image_url` content parts.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use mirador_runtime::llm_driver::{ChatMessage, LlmDriver, Role};
//!
//! let driver = LlmDriver::new("https://api.openai.com", "gpt-4o-mini")
//!     .with_api_key("sk-...")
//!     .with_timeout(Duration::from_secs(60));
//!
//! let messages = vec![ChatMessage::text(Role::User, "Describe a sunset.")];
//! // Requires a live server – skipped in unit tests.
//! // let reply = driver.complete(&messages).await.unwrap();
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mirador_types::CapturedImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::ReasoningModel;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from any model call.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The call did not complete within its deadline.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    /// The HTTP request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    /// The server answered with a non-2xx status.
    #[error("model server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

impl LlmError {
    /// Classify a transport error, mapping reqwest timeouts to
    /// [`LlmError::Timeout`].
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::Http(err)
        }
    }

    /// Turn a non-success response into [`LlmError::Status`].
    pub(crate) async fn from_status(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        LlmError::Status { status, body }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// An inline image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the content, ignoring image parts.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    /// A user message carrying `prompt` plus a JPEG data-URL image part.
    pub fn with_image(prompt: impl Into<String>, image: &CapturedImage) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: prompt.into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url(image),
                    },
                },
            ]),
        }
    }
}

/// `data:image/jpeg;base64,…` for the compressed capture.
pub fn data_url(image: &CapturedImage) -> String {
    format!(
        "data:{};base64,{}",
        CapturedImage::MIME_TYPE,
        BASE64.encode(&image.encoded)
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// An async client for an OpenAI-compatible chat-completions endpoint.
///
/// Construct once per session and reuse across turns.
pub struct LlmDriver {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl LlmDriver {
    /// Create a new driver pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.  Empty keys are
    /// ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `messages` to the model and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// [`LlmError::Timeout`] / [`LlmError::Http`] on transport failures,
    /// [`LlmError::Status`] on non-2xx responses, and
    /// [`LlmError::BadResponse`] if the response shape is unexpected.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let mut request = self.client.post(&url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        if !response.status().is_success() {
            return Err(LlmError::from_status(response).await);
        }
        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::BadResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.as_text())
            .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))
    }
}

#[async_trait]
impl ReasoningModel for LlmDriver {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&CapturedImage>,
    ) -> Result<String, LlmError> {
        let message = match image {
            Some(image) => ChatMessage::with_image(prompt, image),
            None => ChatMessage::text(Role::User, prompt),
        };
        self.complete(std::slice::from_ref(&message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirador_types::{RawImage, SourceKind};

    fn tiny_capture() -> CapturedImage {
        CapturedImage {
            pixels: RawImage::from_rgb8(1, 1, vec![0, 0, 0]).unwrap(),
            encoded: vec![1, 2, 3],
            source_kind: SourceKind::Camera,
            persisted_path: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn chat_message_serializes_role() {
        let msg = ChatMessage::text(Role::System, "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"system\""));
        assert!(json.contains("\"content\":\"hello\""));
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = ChatMessage::with_image("what is this?", &tiny_capture());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "what is this?");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AQID"
        );
    }

    #[test]
    fn response_content_may_be_string_or_parts() {
        let plain: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"A cat."}"#).unwrap();
        assert_eq!(plain.content.as_text(), "A cat.");

        let parts: ChatMessage = serde_json::from_str(
            r#"{"role":"assistant","content":[{"type":"text","text":"A "},{"type":"text","text":"dog."}]}"#,
        )
        .unwrap();
        assert_eq!(parts.content.as_text(), "A dog.");
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let driver = LlmDriver::new("http://localhost:11434/", "llava").with_api_key("");
        assert!(driver.api_key.is_none());
        assert_eq!(driver.base_url, "http://localhost:11434");
        assert_eq!(driver.name(), "llava");
    }

    #[tokio::test]
    async fn complete_fails_without_server() {
        // Nothing listens on the discard port.
        let driver = LlmDriver::new("http://127.0.0.1:9", "llava")
            .with_timeout(Duration::from_secs(2));
        let result = driver.generate("hi", None).await;
        assert!(matches!(
            result,
            Err(LlmError::Http(_)) | Err(LlmError::Timeout(_))
        ));
    }
}

//! [`OllamaClient`] – Ollama `/api/generate` client.
//!
//! Used for the cheap local intent classifier and, optionally, for a local
//! multimodal reasoning model (images are sent base64-encoded in `images`).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mirador_types::CapturedImage;
use serde::{Deserialize, Serialize};

use crate::capability::{ClassificationModel, ReasoningModel};
use crate::llm_driver::LlmError;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    /// Missing in some error payloads; treated as an empty reply.
    #[serde(default)]
    response: String,
}

/// A non-streaming client for one Ollama model.
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Run one generation with optional base64-encoded images.
    ///
    /// # Errors
    ///
    /// [`LlmError::Timeout`] / [`LlmError::Http`] on transport failures,
    /// [`LlmError::Status`] on non-2xx responses, [`LlmError::BadResponse`]
    /// if the body is not JSON.
    pub async fn generate_raw(
        &self,
        prompt: &str,
        images: Vec<String>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            images,
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;
        if !response.status().is_success() {
            return Err(LlmError::from_status(response).await);
        }
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::BadResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl ClassificationModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate_raw(prompt, Vec::new()).await
    }
}

#[async_trait]
impl ReasoningModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&CapturedImage>,
    ) -> Result<String, LlmError> {
        let images = image
            .map(|img| vec![BASE64.encode(&img.encoded)])
            .unwrap_or_default();
        self.generate_raw(prompt, images).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_images_when_empty() {
        let body = GenerateRequest {
            model: "qwen3:0.6b",
            prompt: "hi",
            stream: false,
            images: Vec::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert!(json.get("images").is_none());
    }

    #[test]
    fn request_carries_base64_images() {
        let body = GenerateRequest {
            model: "gemma3:4b",
            prompt: "what is this?",
            stream: false,
            images: vec!["AQID".to_string()],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["images"][0], "AQID");
    }

    #[test]
    fn missing_response_field_is_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert_eq!(parsed.response, "");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let client = OllamaClient::new("http://127.0.0.1:9", "qwen3:0.6b", Duration::from_secs(2));
        let result = ClassificationModel::complete(&client, "hello").await;
        assert!(matches!(
            result,
            Err(LlmError::Http(_)) | Err(LlmError::Timeout(_))
        ));
    }
}

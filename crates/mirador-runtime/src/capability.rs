//! Model capability seams.
//!
//! The agent loop never talks HTTP directly.  It holds one implementation of
//! each trait per session; tests substitute scripted fakes.

use std::fmt;

use async_trait::async_trait;
use mirador_types::CapturedImage;
use serde::{Deserialize, Serialize};

use crate::llm_driver::LlmError;

/// A cheap model that answers a classification prompt with free text.
#[async_trait]
pub trait ClassificationModel: Send + Sync {
    /// Model identifier used in log fields.
    fn name(&self) -> &str;

    /// Send `prompt` and return the raw reply text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// The reasoning model, optionally multimodal.
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Model identifier used in log fields.
    fn name(&self) -> &str;

    /// Send `prompt`, with `image` attached when present, and return the raw
    /// reply text.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&CapturedImage>,
    ) -> Result<String, LlmError>;
}

/// Which wire protocol the reasoning model is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProvider {
    /// Ollama `/api/generate` with base64 `images`.
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` with `image_url` parts.
    #[serde(rename = "openai")]
    OpenAi,
}

impl fmt::Display for ReasoningProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasoningProvider::Ollama => write!(f, "ollama"),
            ReasoningProvider::OpenAi => write!(f, "openai"),
        }
    }
}

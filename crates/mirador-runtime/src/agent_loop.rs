//! [`AgentLoop`] – the turn-by-turn orchestrator.
//!
//! Each call to [`AgentLoop::handle_turn`] walks one user utterance through
//! the state machine:
//!
//! ```text
//! AwaitingInput → Classifying → Dispatching ─┬─ STOP ──────────────→ Stopped
//!                                             ├─ CAMERA / SCREENSHOT → Image pipeline ─┐
//!                                             └─ CHAT ─────────────────────────────────┤
//!                                                                                      ↓
//!                         AwaitingInput ← UpdatingMemory ← Responding (or fallback reply)
//! ```
//!
//! # Degradation
//!
//! Nothing but a STOP turn ends the session:
//!
//! - a classifier failure is absorbed by [`IntentClassifier`] (→ CHAT);
//! - an unavailable camera or failed screenshot yields a fixed fallback reply
//!   and the reasoning model is not called;
//! - a reasoning failure yields [`REASONING_UNAVAILABLE_REPLY`].
//!
//! Fallback replies are stored in memory like real replies so the next
//! prompt's context stays consistent with what the user saw.
//!
//! # Example
//!
//! ```rust,no_run
//! use mirador_hal::{ImagePipeline, PipelineConfig};
//! use mirador_hal::sim::SimScreen;
//! use mirador_runtime::agent_loop::{AgentLoop, AgentLoopConfig, TurnOutcome};
//!
//! # async fn demo() {
//! let pipeline = ImagePipeline::new(PipelineConfig::default(), None, SimScreen::new());
//! let mut agent = AgentLoop::new(AgentLoopConfig::default(), pipeline).unwrap();
//! if let TurnOutcome::Reply(reply) = agent.handle_turn("hello").await {
//!     println!("Agent: {}", reply.text);
//! }
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use mirador_hal::{Acquisition, ImagePipeline};
use mirador_memory::{ConversationMemory, TokenUsageLog};
use mirador_types::{CapturedImage, Intent, MiradorError, SourceKind};
use tracing::{debug, info, instrument, warn};

use crate::capability::{ReasoningModel, ReasoningProvider};
use crate::intent::IntentClassifier;
use crate::llm_driver::LlmDriver;
use crate::ollama::OllamaClient;
use crate::responder::ResponseGenerator;

// ─────────────────────────────────────────────────────────────────────────────
// Fallback replies
// ─────────────────────────────────────────────────────────────────────────────

pub const CAMERA_UNAVAILABLE_REPLY: &str = "Camera not available.";
pub const SCREEN_UNAVAILABLE_REPLY: &str = "Screenshot failed.";
pub const REASONING_UNAVAILABLE_REPLY: &str =
    "Sorry, the reasoning model is unavailable right now. Please try again.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`AgentLoop::new`].
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Base URL of the Ollama server hosting the classifier.
    pub classifier_url: String,
    pub classifier_model: String,
    pub classifier_timeout: Duration,
    pub reasoning_provider: ReasoningProvider,
    pub reasoning_url: String,
    pub reasoning_model: String,
    /// Bearer token for OpenAI-compatible servers; ignored by Ollama.
    pub reasoning_api_key: Option<String>,
    pub reasoning_timeout: Duration,
    /// Maximum number of remembered turns (user and agent entries counted
    /// separately).  Must be even.
    pub memory_capacity: usize,
    /// NDJSON token-usage log; `None` disables logging.
    pub usage_log_path: Option<PathBuf>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            classifier_url: "http://localhost:11434".to_string(),
            classifier_model: "qwen3:0.6b".to_string(),
            classifier_timeout: Duration::from_secs(10),
            reasoning_provider: ReasoningProvider::Ollama,
            reasoning_url: "http://localhost:11434".to_string(),
            reasoning_model: "gemma3:4b".to_string(),
            reasoning_api_key: None,
            reasoning_timeout: Duration::from_secs(120),
            memory_capacity: 6,
            usage_log_path: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// States and outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Where the loop currently is in the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Classifying,
    Dispatching,
    Responding,
    UpdatingMemory,
    /// Terminal.
    Stopped,
}

/// Why a turn's reply is a fallback rather than a model answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    CaptureUnavailable(SourceKind),
    ReasoningFailed,
}

/// A completed (non-STOP) turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub intent: Intent,
    pub text: String,
    /// Where the turn's capture was saved, if any.
    pub image_path: Option<PathBuf>,
    pub degraded: Option<Degradation>,
}

/// Result of [`AgentLoop::handle_turn`].
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Reply(TurnReply),
    /// The session is over; no further turns are processed.
    Stopped,
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the session: classifier, image pipeline, responder, and memory.
pub struct AgentLoop {
    classifier: IntentClassifier,
    pipeline: ImagePipeline,
    responder: ResponseGenerator,
    memory: ConversationMemory,
    state: LoopState,
}

impl AgentLoop {
    /// Build a loop whose model clients are created from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::InvalidConfig`] if the memory capacity is zero
    /// or odd.
    pub fn new(config: AgentLoopConfig, pipeline: ImagePipeline) -> Result<Self, MiradorError> {
        let memory = ConversationMemory::new(config.memory_capacity)
            .map_err(|e| MiradorError::InvalidConfig(e.to_string()))?;

        let classifier_model = OllamaClient::new(
            &config.classifier_url,
            &config.classifier_model,
            config.classifier_timeout,
        );
        let mut classifier =
            IntentClassifier::new(Box::new(classifier_model), config.classifier_timeout);

        let reasoning_model: Box<dyn ReasoningModel> = match config.reasoning_provider {
            ReasoningProvider::Ollama => Box::new(OllamaClient::new(
                &config.reasoning_url,
                &config.reasoning_model,
                config.reasoning_timeout,
            )),
            ReasoningProvider::OpenAi => Box::new(
                LlmDriver::new(&config.reasoning_url, &config.reasoning_model)
                    .with_api_key(config.reasoning_api_key.clone().unwrap_or_default())
                    .with_timeout(config.reasoning_timeout),
            ),
        };
        let mut responder = ResponseGenerator::new(reasoning_model, config.reasoning_timeout);

        if let Some(path) = &config.usage_log_path {
            info!(path = %path.display(), "token usage logging enabled");
            let log = TokenUsageLog::new(path);
            classifier = classifier.with_usage_log(log.clone());
            responder = responder.with_usage_log(log);
        }

        info!(
            classifier = %config.classifier_model,
            reasoning = %config.reasoning_model,
            provider = %config.reasoning_provider,
            memory_capacity = config.memory_capacity,
            camera = pipeline.has_camera(),
            "agent loop initialised"
        );

        Ok(Self::from_parts(classifier, pipeline, responder, memory))
    }

    /// Assemble a loop from pre-built components.
    pub fn from_parts(
        classifier: IntentClassifier,
        pipeline: ImagePipeline,
        responder: ResponseGenerator,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            classifier,
            pipeline,
            responder,
            memory,
            state: LoopState::AwaitingInput,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == LoopState::Stopped
    }

    /// Read-only view of the conversation memory.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// End the session without a STOP turn (e.g. end of input).
    pub fn shutdown(&mut self) {
        self.transition(LoopState::Stopped);
    }

    /// Process one user utterance to completion.
    ///
    /// Once the loop has stopped every call returns [`TurnOutcome::Stopped`]
    /// without side effects.
    #[instrument(skip_all, fields(input_chars = input.len()))]
    pub async fn handle_turn(&mut self, input: &str) -> TurnOutcome {
        if self.is_stopped() {
            return TurnOutcome::Stopped;
        }
        let input = input.trim();

        self.transition(LoopState::Classifying);
        let intent = self.classifier.classify(input).await;
        info!(intent = %intent, "turn classified");

        self.transition(LoopState::Dispatching);
        if intent == Intent::Stop {
            self.transition(LoopState::Stopped);
            return TurnOutcome::Stopped;
        }
        let (text, image_path, degraded) = match intent.source_kind() {
            Some(source) => self.respond_with_capture(input, intent, source).await,
            None => {
                let (text, degraded) = self.respond(input, intent, None).await;
                (text, None, degraded)
            }
        };

        self.transition(LoopState::UpdatingMemory);
        self.memory.append(input, text.as_str());

        self.transition(LoopState::AwaitingInput);
        TurnOutcome::Reply(TurnReply {
            intent,
            text,
            image_path,
            degraded,
        })
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    async fn respond_with_capture(
        &mut self,
        input: &str,
        intent: Intent,
        source: SourceKind,
    ) -> (String, Option<PathBuf>, Option<Degradation>) {
        match self.pipeline.acquire(source) {
            Acquisition::Captured(image) => {
                let (text, degraded) = self.respond(input, intent, Some(&image)).await;
                (text, image.release(), degraded)
            }
            Acquisition::Unavailable { reason, .. } => {
                warn!(
                    source = %source,
                    reason = %reason,
                    "capture unavailable; using fallback reply"
                );
                let fallback = match source {
                    SourceKind::Camera => CAMERA_UNAVAILABLE_REPLY,
                    SourceKind::Screen => SCREEN_UNAVAILABLE_REPLY,
                };
                (
                    fallback.to_string(),
                    None,
                    Some(Degradation::CaptureUnavailable(source)),
                )
            }
        }
    }

    async fn respond(
        &mut self,
        input: &str,
        intent: Intent,
        image: Option<&CapturedImage>,
    ) -> (String, Option<Degradation>) {
        self.transition(LoopState::Responding);
        match self.responder.respond(&self.memory, input, intent, image).await {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(error = %e, "reasoning call failed; using fallback reply");
                (
                    REASONING_UNAVAILABLE_REPLY.to_string(),
                    Some(Degradation::ReasoningFailed),
                )
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

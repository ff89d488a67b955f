//! `mirador-runtime` – the conversational agent loop.
//!
//! # Modules
//!
//! - [`agent_loop`] – [`AgentLoop`][agent_loop::AgentLoop]: the per-turn
//!   state machine (classify → dispatch → capture → respond → remember).
//! - [`intent`] – [`IntentClassifier`][intent::IntentClassifier]: asks a
//!   cheap local model for one of `CHAT`, `CAMERA`, `SCREENSHOT`, `STOP` and
//!   falls back to `CHAT` on any failure.
//! - [`responder`] – [`ResponseGenerator`][responder::ResponseGenerator]:
//!   builds the reasoning prompt from memory, input, action and image.
//! - [`capability`] – the [`ClassificationModel`] and [`ReasoningModel`]
//!   traits the loop is written against.
//! - [`ollama`] – [`OllamaClient`][ollama::OllamaClient]: `/api/generate`
//!   client implementing both capabilities.
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver]: an
//!   OpenAI-compatible chat-completions client for the reasoning model.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod agent_loop;
pub mod capability;
pub mod intent;
pub mod llm_driver;
pub mod ollama;
pub mod responder;
pub mod telemetry;

pub use agent_loop::{AgentLoop, AgentLoopConfig, Degradation, LoopState, TurnOutcome, TurnReply};
pub use capability::{ClassificationModel, ReasoningModel, ReasoningProvider};
pub use intent::IntentClassifier;
pub use llm_driver::{ChatMessage, LlmDriver, LlmError, Role};
pub use ollama::OllamaClient;
pub use responder::ResponseGenerator;
pub use telemetry::{TracerProviderGuard, init_tracing};

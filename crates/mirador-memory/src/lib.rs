//! `mirador-memory` – what the agent remembers.
//!
//! # Modules
//!
//! - [`conversation`] – [`ConversationMemory`][conversation::ConversationMemory]:
//!   a bounded FIFO of user/agent turns rendered verbatim into every prompt.
//!   Lives for one session only.
//! - [`usage_log`] – [`TokenUsageLog`][usage_log::TokenUsageLog]: an
//!   append-only NDJSON file of estimated token usage per model call.

pub mod conversation;
pub mod usage_log;

pub use conversation::{ConversationMemory, MemoryError};
pub use usage_log::{TokenUsageLog, UsageLogError, estimate_tokens};

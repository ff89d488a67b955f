//! [`ResponseGenerator`] – build the reasoning prompt and call the model.

use std::time::Duration;

use mirador_memory::{ConversationMemory, TokenUsageLog};
use mirador_types::{CapturedImage, Intent};
use tracing::{debug, instrument, warn};

use crate::capability::ReasoningModel;
use crate::llm_driver::LlmError;

/// Fixed framing at the top of every reasoning prompt.
pub const SYSTEM_FRAMING: &str = "You are a helpful assistant.";

/// Build the reasoning prompt.
///
/// `context` is the rendered conversation memory; an empty context is shown
/// as `(none)`.
pub fn build_prompt(
    context: &str,
    user_input: &str,
    action: Intent,
    image: Option<&CapturedImage>,
) -> String {
    let context = if context.is_empty() { "(none)" } else { context };
    let mut prompt = format!(
        "{SYSTEM_FRAMING}\n\n\
         Recent context:\n{context}\n\n\
         User:\n{user_input}\n\n\
         Action performed:\n{action}\n"
    );
    if let Some(image) = image {
        prompt.push_str(&format!(
            "\nAn image captured from the {} is attached. Use it to answer.\n",
            image.source_kind
        ));
    }
    prompt.push_str("\nReply briefly and clearly.");
    prompt
}

/// Produces the agent's reply for one turn.
pub struct ResponseGenerator {
    model: Box<dyn ReasoningModel>,
    timeout: Duration,
    usage_log: Option<TokenUsageLog>,
}

impl ResponseGenerator {
    pub fn new(model: Box<dyn ReasoningModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            usage_log: None,
        }
    }

    pub fn with_usage_log(mut self, log: TokenUsageLog) -> Self {
        self.usage_log = Some(log);
        self
    }

    /// Ask the reasoning model for a reply to `user_input`.
    ///
    /// The image, when present, is only borrowed for the duration of the call.
    ///
    /// # Errors
    ///
    /// Any [`LlmError`] from the model, or [`LlmError::Timeout`] if the call
    /// exceeds the configured deadline.
    #[instrument(skip_all, fields(action = %action, with_image = image.is_some()))]
    pub async fn respond(
        &self,
        memory: &ConversationMemory,
        user_input: &str,
        action: Intent,
        image: Option<&CapturedImage>,
    ) -> Result<String, LlmError> {
        let prompt = build_prompt(&memory.context(), user_input, action, image);
        debug!(
            model = self.model.name(),
            action = %action,
            with_image = image.is_some(),
            prompt_chars = prompt.len(),
            "calling reasoning model"
        );

        let raw = tokio::time::timeout(self.timeout, self.model.generate(&prompt, image))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;
        let reply = raw.trim().to_string();

        if let Some(log) = &self.usage_log
            && let Err(e) = log.record(action.label(), &prompt, &reply)
        {
            warn!(error = %e, "failed to record reasoning token usage");
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mirador_types::{RawImage, SourceKind};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        prompts: Vec<String>,
        images: Vec<bool>,
    }

    struct RecordingModel {
        reply: Result<&'static str, ()>,
        seen: Arc<Mutex<Recorded>>,
    }

    #[async_trait]
    impl ReasoningModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(
            &self,
            prompt: &str,
            image: Option<&CapturedImage>,
        ) -> Result<String, LlmError> {
            let mut seen = self.seen.lock().unwrap();
            seen.prompts.push(prompt.to_string());
            seen.images.push(image.is_some());
            self.reply
                .map(str::to_string)
                .map_err(|_| LlmError::BadResponse("simulated failure".into()))
        }
    }

    fn capture() -> CapturedImage {
        CapturedImage {
            pixels: RawImage::from_rgb8(1, 1, vec![0, 0, 0]).unwrap(),
            encoded: vec![0xff, 0xd8],
            source_kind: SourceKind::Screen,
            persisted_path: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn prompt_for_empty_memory_says_none() {
        let prompt = build_prompt("", "hello", Intent::Chat, None);
        assert!(prompt.starts_with(SYSTEM_FRAMING));
        assert!(prompt.contains("Recent context:\n(none)"));
        assert!(prompt.contains("User:\nhello"));
        assert!(prompt.contains("Action performed:\nCHAT"));
        assert!(!prompt.contains("attached"));
    }

    #[test]
    fn prompt_mentions_attached_image() {
        let prompt = build_prompt(
            "User: hi\nAgent: hey",
            "what's this?",
            Intent::CaptureScreen,
            Some(&capture()),
        );
        assert!(prompt.contains("User: hi\nAgent: hey"));
        assert!(prompt.contains("captured from the screen is attached"));
    }

    #[tokio::test]
    async fn reply_is_trimmed_and_image_forwarded() {
        let seen = Arc::new(Mutex::new(Recorded::default()));
        let generator = ResponseGenerator::new(
            Box::new(RecordingModel {
                reply: Ok("  \n A text editor.\n"),
                seen: Arc::clone(&seen),
            }),
            Duration::from_secs(5),
        );
        let memory = ConversationMemory::new(6).unwrap();
        let image = capture();

        let reply = generator
            .respond(&memory, "what's on screen?", Intent::CaptureScreen, Some(&image))
            .await
            .unwrap();
        assert_eq!(reply, "A text editor.");
        assert_eq!(seen.lock().unwrap().images, vec![true]);
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let generator = ResponseGenerator::new(
            Box::new(RecordingModel {
                reply: Err(()),
                seen: Arc::default(),
            }),
            Duration::from_secs(5),
        );
        let memory = ConversationMemory::new(6).unwrap();
        let result = generator.respond(&memory, "hi", Intent::Chat, None).await;
        assert!(matches!(result, Err(LlmError::BadResponse(_))));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        struct Stalled;

        #[async_trait]
        impl ReasoningModel for Stalled {
            fn name(&self) -> &str {
                "stalled"
            }

            async fn generate(
                &self,
                _prompt: &str,
                _image: Option<&CapturedImage>,
            ) -> Result<String, LlmError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".to_string())
            }
        }

        let generator = ResponseGenerator::new(Box::new(Stalled), Duration::from_millis(20));
        let memory = ConversationMemory::new(6).unwrap();
        let result = generator.respond(&memory, "hi", Intent::Chat, None).await;
        assert!(matches!(result, Err(LlmError::Timeout(d)) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn usage_is_logged_with_action_label() {
        let dir = tempfile::tempdir().unwrap();
        let log = TokenUsageLog::new(dir.path().join("usage.jsonl"));
        let generator = ResponseGenerator::new(
            Box::new(RecordingModel {
                reply: Ok("Hi!"),
                seen: Arc::default(),
            }),
            Duration::from_secs(5),
        )
        .with_usage_log(log.clone());
        let memory = ConversationMemory::new(6).unwrap();
        generator.respond(&memory, "hello", Intent::Chat, None).await.unwrap();

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert!(raw.contains("\"action\":\"CHAT\""));
    }
}

//! [`IntentClassifier`] – map a user utterance to an [`Intent`].
//!
//! The classifier never fails: a timeout, transport error, or a reply that
//! names none of the labels all degrade to [`Intent::Chat`].
//!
//! # Label reduction
//!
//! The model reply is uppercased and scanned for each label in
//! [`Intent::PRIORITY`] order (`CHAT`, `CAMERA`, `SCREENSHOT`, `STOP`); the
//! first label that occurs anywhere in the reply wins.  A reply such as
//! `"this is not camera, just stop"` therefore reduces to `CAMERA`.
//!
//! # Stop sentinels
//!
//! Utterances that are exactly one of [`STOP_SENTINELS`] are classified as
//! [`Intent::Stop`] locally, without a model call, so a session can always be
//! ended even when the classification server is down.

use std::time::Duration;

use mirador_memory::TokenUsageLog;
use mirador_types::Intent;
use tracing::{debug, instrument, warn};

use crate::capability::ClassificationModel;

/// Whole-utterance phrases that end the session without asking the model.
pub const STOP_SENTINELS: &[&str] = &[
    "exit", "quit", "stop", "bye", "goodbye", "shutdown", "/exit", "/quit",
];

/// Action label written to the usage log for classification calls.
pub const USAGE_ACTION: &str = "CLASSIFY";

/// `true` if `utterance` (trimmed, case-insensitive) is a stop sentinel.
pub fn is_stop_sentinel(utterance: &str) -> bool {
    let normalized = utterance.trim().to_lowercase();
    STOP_SENTINELS.contains(&normalized.as_str())
}

/// The instruction sent to the classification model.
pub fn build_prompt(utterance: &str) -> String {
    format!(
        "You are an intent classification system. Classify the user message \
         \"{utterance}\" into EXACTLY ONE intent from [CHAT, CAMERA, SCREENSHOT, STOP]. \
         Rules: CAMERA=seeing/looking/objects in front/webcam; \
         SCREENSHOT=screen/window/UI/desktop; STOP=exit/quit/shutdown; \
         if unsure choose CHAT. Output ONLY one word, no explanations."
    )
}

/// First label of [`Intent::PRIORITY`] found in `reply`, if any.
pub fn reduce_label(reply: &str) -> Option<Intent> {
    let upper = reply.to_uppercase();
    Intent::PRIORITY
        .into_iter()
        .find(|intent| upper.contains(intent.label()))
}

/// Classifies utterances with a bounded-time model call.
pub struct IntentClassifier {
    model: Box<dyn ClassificationModel>,
    timeout: Duration,
    usage_log: Option<TokenUsageLog>,
}

impl IntentClassifier {
    pub fn new(model: Box<dyn ClassificationModel>, timeout: Duration) -> Self {
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

    /// Classify `utterance`.  Never fails; see the module docs.
    #[instrument(skip_all)]
    pub async fn classify(&self, utterance: &str) -> Intent {
        if is_stop_sentinel(utterance) {
            debug!(utterance, "stop sentinel matched locally");
            return Intent::Stop;
        }

        let prompt = build_prompt(utterance);
        let reply = match tokio::time::timeout(self.timeout, self.model.complete(&prompt)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(
                    model = self.model.name(),
                    error = %e,
                    "intent detection failed; defaulting to CHAT"
                );
                return Intent::Chat;
            }
            Err(_) => {
                warn!(
                    model = self.model.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "intent detection timed out; defaulting to CHAT"
                );
                return Intent::Chat;
            }
        };

        if let Some(log) = &self.usage_log
            && let Err(e) = log.record(USAGE_ACTION, &prompt, &reply)
        {
            warn!(error = %e, "failed to record classifier token usage");
        }

        match reduce_label(&reply) {
            Some(intent) => intent,
            None => {
                debug!(reply = %reply.trim(), "no intent label in classifier reply; defaulting to CHAT");
                Intent::Chat
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_driver::LlmError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with a fixed text, or fails when `reply` is `None`.
    struct ScriptedModel {
        reply: Option<&'static str>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ClassificationModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .map(str::to_string)
                .ok_or_else(|| LlmError::BadResponse("simulated outage".into()))
        }
    }

    fn classifier(model: ScriptedModel) -> IntentClassifier {
        IntentClassifier::new(Box::new(model), Duration::from_secs(5))
    }

    #[test]
    fn reduce_prefers_camera_over_stop() {
        assert_eq!(
            reduce_label("this is not camera, just stop"),
            Some(Intent::CaptureCamera)
        );
    }

    #[test]
    fn reduce_prefers_chat_over_everything() {
        assert_eq!(reduce_label("STOP... or maybe CHAT"), Some(Intent::Chat));
        assert_eq!(reduce_label("screenshot then stop"), Some(Intent::CaptureScreen));
    }

    #[test]
    fn reduce_is_case_insensitive_and_substring_based() {
        assert_eq!(reduce_label("  camera\n"), Some(Intent::CaptureCamera));
        assert_eq!(reduce_label("<think>hmm</think> STOP"), Some(Intent::Stop));
        assert_eq!(reduce_label("I am not sure"), None);
        assert_eq!(reduce_label(""), None);
    }

    #[test]
    fn prompt_embeds_utterance_and_labels() {
        let prompt = build_prompt("what do you see?");
        assert!(prompt.contains("\"what do you see?\""));
        for intent in Intent::PRIORITY {
            assert!(prompt.contains(intent.label()));
        }
    }

    #[test]
    fn sentinels_are_whole_utterance_matches() {
        assert!(is_stop_sentinel("exit"));
        assert!(is_stop_sentinel("  QUIT \n"));
        assert!(!is_stop_sentinel("how do I exit vim?"));
    }

    #[tokio::test]
    async fn model_stop_reply_is_stop() {
        let c = classifier(ScriptedModel::replying("STOP"));
        assert_eq!(c.classify("please shut yourself down").await, Intent::Stop);
    }

    #[tokio::test]
    async fn stop_sentinel_survives_classifier_outage() {
        let model = ScriptedModel::failing();
        let calls = Arc::clone(&model.calls);
        let c = classifier(model);
        assert_eq!(c.classify("exit").await, Intent::Stop);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn outage_defaults_to_chat() {
        let model = ScriptedModel::failing();
        let calls = Arc::clone(&model.calls);
        let c = classifier(model);
        assert_eq!(c.classify("can you look at this?").await, Intent::Chat);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecognised_reply_defaults_to_chat() {
        let c = classifier(ScriptedModel::replying("¯\\_(ツ)_/¯"));
        assert_eq!(c.classify("hmm").await, Intent::Chat);
    }

    #[tokio::test]
    async fn slow_model_times_out_to_chat() {
        let mut model = ScriptedModel::replying("CAMERA");
        model.delay = Duration::from_secs(30);
        let c = IntentClassifier::new(Box::new(model), Duration::from_millis(20));
        assert_eq!(c.classify("what's in front of me?").await, Intent::Chat);
    }

    #[tokio::test]
    async fn successful_call_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log = TokenUsageLog::new(dir.path().join("usage.jsonl"));
        let c = classifier(ScriptedModel::replying("SCREENSHOT")).with_usage_log(log.clone());
        assert_eq!(c.classify("what's on my screen?").await, Intent::CaptureScreen);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.contains("\"action\":\"CLASSIFY\""));
    }
}

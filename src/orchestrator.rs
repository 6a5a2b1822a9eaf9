//! Event orchestration: acknowledge fast, process in the background.
//!
//! The webhook (and socket transport) hand every decoded envelope to
//! [`Orchestrator::handle_envelope`], which replies immediately with a
//! short status and spawns a detached task for qualifying messages. AI
//! and delivery failures stay inside that task; the HTTP response never
//! waits on them.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::normalize::strip_mentions;
use crate::openai::AssistantBackend;
use crate::router::{ConversationRouter, ProcessingMode};
use crate::slack::client::ChatApi;
use crate::slack::delivery::DeliveryEngine;
use crate::slack::events::{classify, EventEnvelope, InboundMessage, MessageKind};
use crate::store::BindingStore;

/// Synchronous webhook outcome, serialized by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    /// `url_verification` handshake: echo the challenge back.
    Challenge(String),
    /// Everything else acknowledges with a short status message.
    Status(&'static str),
}

/// Which AI path answers the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    /// Assistants v2 with per-user DM threads.
    Assistant,
    /// Single-turn chat completion, no context anywhere.
    Chat,
}

pub struct Orchestrator {
    chat: Arc<dyn ChatApi>,
    delivery: DeliveryEngine,
    router: ConversationRouter,
    backend: Arc<dyn AssistantBackend>,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        backend: Arc<dyn AssistantBackend>,
        store: Arc<dyn BindingStore>,
    ) -> Self {
        Self {
            delivery: DeliveryEngine::new(Arc::clone(&chat)),
            router: ConversationRouter::new(store, Arc::clone(&backend)),
            chat,
            backend,
        }
    }

    /// Decide the synchronous reply and, for qualifying user messages,
    /// spawn the processing task. Returns before any AI work starts.
    pub fn handle_envelope(self: Arc<Self>, envelope: EventEnvelope, mode: AiMode) -> WebhookReply {
        if envelope.kind == "url_verification" {
            if let Some(challenge) = envelope.challenge {
                return WebhookReply::Challenge(challenge);
            }
        }

        if envelope.kind == "event_callback" {
            if let Some(event) = envelope.event {
                if event.kind == "message" || event.kind == "app_mention" {
                    return match classify(&event) {
                        MessageKind::Bot | MessageKind::App => {
                            WebhookReply::Status("Ignored bot message")
                        }
                        MessageKind::SystemSubtype => WebhookReply::Status("Ignored system message"),
                        MessageKind::Malformed => {
                            WebhookReply::Status("Missing required event data")
                        }
                        MessageKind::User(message) => {
                            let clean_text = strip_mentions(&message.text);
                            if clean_text.is_empty() {
                                return WebhookReply::Status("Empty message after cleanup");
                            }
                            self.spawn_processing(message, clean_text, mode);
                            WebhookReply::Status("Event received")
                        }
                    };
                }
            }
        }

        WebhookReply::Status("Event type not handled")
    }

    fn spawn_processing(self: Arc<Self>, message: InboundMessage, clean_text: String, mode: AiMode) {
        let channel = message.channel.clone();
        let orchestrator = self;
        let task = tokio::spawn(async move {
            orchestrator.process_message(message, clean_text, mode).await;
        });
        // Boundary catch-all: Result paths resolve inside the task, so
        // only a panic can reach here. Log it instead of losing it.
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!(channel = %channel, error = %e, "Message processing task aborted");
            }
        });
    }

    /// The detached pipeline: read marker, placeholder, AI round-trip,
    /// delivery. Every failure ends in the delivery error fallback.
    async fn process_message(&self, message: InboundMessage, clean_text: String, mode: AiMode) {
        info!(channel = %message.channel, user = %message.user, "Processing message");

        if let Some(ts) = &message.ts {
            if let Err(e) = self.chat.mark_read(&message.channel, ts).await {
                warn!(channel = %message.channel, error = %e, "Read marker failed");
            }
        }

        let job = self
            .delivery
            .post_placeholder(&message.channel, message.thread_ts.as_deref())
            .await;

        match self.ask(&message, &clean_text, mode).await {
            Ok(response) => self.delivery.deliver(&job, &response).await,
            Err(e) => {
                error!(channel = %message.channel, error = %e, "Message processing failed");
                self.delivery.deliver_error(&job).await;
            }
        }
    }

    async fn ask(
        &self,
        message: &InboundMessage,
        clean_text: &str,
        mode: AiMode,
    ) -> crate::error::Result<String> {
        let response = match mode {
            AiMode::Chat => self.backend.chat_completion(clean_text).await?,
            AiMode::Assistant => match ProcessingMode::for_channel(&message.channel) {
                ProcessingMode::Stateful => {
                    let thread_id = self.router.resolve_thread(&message.user).await?;
                    self.backend.ask_stateful(&thread_id, clean_text).await?
                }
                ProcessingMode::Stateless => self.backend.ask_stateless(clean_text).await?,
            },
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{OpenAiError, SlackError};
    use crate::slack::delivery::{ERROR_MESSAGE, THINKING_MESSAGE};
    use crate::store::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Post { channel: String, text: String },
        Update { ts: String, text: String },
        MarkRead { ts: String },
    }

    #[derive(Default)]
    struct RecordingChat {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingChat {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatApi for RecordingChat {
        async fn post_message(
            &self,
            channel: &str,
            text: &str,
            _thread_ts: Option<&str>,
        ) -> std::result::Result<String, SlackError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Post {
                channel: channel.to_string(),
                text: text.to_string(),
            });
            Ok(format!("ts-{}", calls.len()))
        }

        async fn update_message(
            &self,
            _channel: &str,
            ts: &str,
            text: &str,
        ) -> std::result::Result<(), SlackError> {
            self.calls.lock().unwrap().push(Call::Update {
                ts: ts.to_string(),
                text: text.to_string(),
            });
            Ok(())
        }

        async fn mark_read(&self, _channel: &str, ts: &str) -> std::result::Result<(), SlackError> {
            self.calls.lock().unwrap().push(Call::MarkRead { ts: ts.to_string() });
            Ok(())
        }
    }

    struct StubBackend {
        reply: std::result::Result<String, ()>,
        panics: bool,
        asked: Mutex<Vec<String>>,
    }

    impl StubBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                panics: false,
                asked: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                panics: false,
                asked: Mutex::new(Vec::new()),
            }
        }

        fn panicking() -> Self {
            Self {
                reply: Err(()),
                panics: true,
                asked: Mutex::new(Vec::new()),
            }
        }

        fn answer(&self, label: &str) -> std::result::Result<String, OpenAiError> {
            self.asked.lock().unwrap().push(label.to_string());
            if self.panics {
                panic!("stub backend panic");
            }
            self.reply
                .clone()
                .map_err(|_| OpenAiError::RunFailed("stub failure".to_string()))
        }
    }

    #[async_trait]
    impl AssistantBackend for StubBackend {
        async fn create_thread(&self) -> std::result::Result<String, OpenAiError> {
            Ok("thread_1".to_string())
        }

        async fn ask_stateful(
            &self,
            _thread_id: &str,
            _message: &str,
        ) -> std::result::Result<String, OpenAiError> {
            self.answer("stateful")
        }

        async fn ask_stateless(&self, _message: &str) -> std::result::Result<String, OpenAiError> {
            self.answer("stateless")
        }

        async fn chat_completion(&self, _message: &str) -> std::result::Result<String, OpenAiError> {
            self.answer("chat")
        }
    }

    fn orchestrator(
        chat: Arc<RecordingChat>,
        backend: Arc<StubBackend>,
    ) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(chat, backend, Arc::new(MemoryStore::new())))
    }

    fn envelope(json: serde_json::Value) -> EventEnvelope {
        serde_json::from_value(json).unwrap()
    }

    async fn wait_for_calls(chat: &RecordingChat, count: usize) -> Vec<Call> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let calls = chat.calls();
            if calls.len() >= count {
                return calls;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {count} calls, saw {calls:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn challenge_is_echoed() {
        let orch = orchestrator(
            Arc::new(RecordingChat::default()),
            Arc::new(StubBackend::replying("hi")),
        );
        let reply = orch.handle_envelope(
            envelope(serde_json::json!({"type": "url_verification", "challenge": "tok"})),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Challenge("tok".to_string()));
    }

    #[tokio::test]
    async fn bot_message_is_ignored_with_no_side_effects() {
        let chat = Arc::new(RecordingChat::default());
        let orch = orchestrator(Arc::clone(&chat), Arc::new(StubBackend::replying("hi")));
        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1", "text": "hi", "bot_id": "B1"},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Ignored bot message"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_event_acknowledges_without_processing() {
        let chat = Arc::new(RecordingChat::default());
        let orch = orchestrator(Arc::clone(&chat), Arc::new(StubBackend::replying("hi")));
        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1"},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Missing required event data"));
    }

    #[tokio::test]
    async fn mention_only_message_is_empty_after_cleanup() {
        let orch = orchestrator(
            Arc::new(RecordingChat::default()),
            Arc::new(StubBackend::replying("hi")),
        );
        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "C1", "user": "U1", "text": "<@U99BOT>  "},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Empty message after cleanup"));
    }

    #[tokio::test]
    async fn unknown_event_type_is_not_handled() {
        let orch = orchestrator(
            Arc::new(RecordingChat::default()),
            Arc::new(StubBackend::replying("hi")),
        );
        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "reaction_added", "user": "U1", "channel": "C1", "text": "x"},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Event type not handled"));
    }

    #[tokio::test]
    async fn dm_message_flows_stateful_and_delivers() {
        let chat = Arc::new(RecordingChat::default());
        let backend = Arc::new(StubBackend::replying("the answer"));
        let orch = orchestrator(Arc::clone(&chat), Arc::clone(&backend));

        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1", "user": "U1", "text": "hello", "ts": "1.0"},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Event received"));

        // mark_read, placeholder post, placeholder update.
        let calls = wait_for_calls(&chat, 3).await;
        assert_eq!(calls[0], Call::MarkRead { ts: "1.0".to_string() });
        assert!(matches!(&calls[1], Call::Post { text, .. } if text == THINKING_MESSAGE));
        assert!(matches!(&calls[2], Call::Update { text, .. } if text == "the answer"));
        assert_eq!(backend.asked.lock().unwrap().as_slice(), ["stateful"]);
    }

    #[tokio::test]
    async fn channel_message_flows_stateless() {
        let chat = Arc::new(RecordingChat::default());
        let backend = Arc::new(StubBackend::replying("ok"));
        let orch = orchestrator(Arc::clone(&chat), Arc::clone(&backend));

        orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "app_mention", "channel": "C1", "user": "U1", "text": "<@U99BOT> hello", "ts": "1.0"},
            })),
            AiMode::Assistant,
        );

        wait_for_calls(&chat, 3).await;
        assert_eq!(backend.asked.lock().unwrap().as_slice(), ["stateless"]);
    }

    #[tokio::test]
    async fn chat_mode_uses_chat_completion() {
        let chat = Arc::new(RecordingChat::default());
        let backend = Arc::new(StubBackend::replying("ok"));
        let orch = orchestrator(Arc::clone(&chat), Arc::clone(&backend));

        orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1", "user": "U1", "text": "hello", "ts": "1.0"},
            })),
            AiMode::Chat,
        );

        wait_for_calls(&chat, 3).await;
        assert_eq!(backend.asked.lock().unwrap().as_slice(), ["chat"]);
    }

    #[tokio::test]
    async fn backend_failure_turns_into_the_error_message() {
        let chat = Arc::new(RecordingChat::default());
        let orch = orchestrator(Arc::clone(&chat), Arc::new(StubBackend::failing()));

        orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1", "user": "U1", "text": "hello", "ts": "1.0"},
            })),
            AiMode::Assistant,
        );

        let calls = wait_for_calls(&chat, 3).await;
        assert!(matches!(&calls[2], Call::Update { text, .. } if text == ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn panicking_backend_does_not_poison_the_caller() {
        let chat = Arc::new(RecordingChat::default());
        let orch = orchestrator(Arc::clone(&chat), Arc::new(StubBackend::panicking()));

        let reply = orch.handle_envelope(
            envelope(serde_json::json!({
                "type": "event_callback",
                "event": {"type": "message", "channel": "D1", "user": "U1", "text": "hello", "ts": "1.0"},
            })),
            AiMode::Assistant,
        );
        assert_eq!(reply, WebhookReply::Status("Event received"));

        // The task dies mid-pipeline; the caller and runtime carry on.
        // Only the read marker and the placeholder made it out.
        let calls = wait_for_calls(&chat, 2).await;
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[1], Call::Post { text, .. } if text == THINKING_MESSAGE));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chat.calls().len(), 2);
    }
}

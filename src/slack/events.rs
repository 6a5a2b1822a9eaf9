//! Inbound Slack event model.
//!
//! Events arrive either as webhook JSON bodies or as Socket Mode
//! envelope payloads; both decode into the same [`EventEnvelope`].
//! Message provenance is decided once at ingestion ([`classify`]) so
//! downstream code dispatches on an explicit [`MessageKind`] tag instead
//! of re-probing optional fields.

use serde::Deserialize;

/// Top-level event body: handshake or event callback.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub challenge: Option<String>,
    pub event: Option<MessageEvent>,
}

/// The inner `event` object of an `event_callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub channel: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
    pub bot_id: Option<String>,
    pub app_id: Option<String>,
    pub subtype: Option<String>,
}

/// A qualifying user message, with every field the pipeline needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user: String,
    pub channel: String,
    pub text: String,
    /// Timestamp of the message itself (used for read marking).
    pub ts: Option<String>,
    /// Thread anchor when the message was posted inside a thread.
    pub thread_ts: Option<String>,
}

/// Message provenance, determined once at ingestion.
#[derive(Debug, Clone)]
pub enum MessageKind {
    /// A human user message carrying all required fields.
    User(InboundMessage),
    /// Posted by a bot — never answered, prevents reply loops.
    Bot,
    /// Posted by an installed app.
    App,
    /// A system subtype (join/leave/edit notices and the like).
    SystemSubtype,
    /// Missing user, channel, or text.
    Malformed,
}

/// Classify a message event. Bot and app markers win over everything;
/// a missing required field makes the event [`MessageKind::Malformed`].
pub fn classify(event: &MessageEvent) -> MessageKind {
    if event.bot_id.is_some() {
        return MessageKind::Bot;
    }
    if event.app_id.is_some() {
        return MessageKind::App;
    }
    if event.subtype.is_some() {
        return MessageKind::SystemSubtype;
    }

    match (&event.user, &event.channel, &event.text) {
        (Some(user), Some(channel), Some(text)) => MessageKind::User(InboundMessage {
            user: user.clone(),
            channel: channel.clone(),
            text: text.clone(),
            ts: event.ts.clone(),
            thread_ts: event.thread_ts.clone(),
        }),
        _ => MessageKind::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: serde_json::Value) -> MessageEvent {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn user_message_classifies_with_fields() {
        let kind = classify(&event(serde_json::json!({
            "type": "message",
            "user": "U1",
            "channel": "D1",
            "text": "hello",
            "ts": "1.2",
        })));
        match kind {
            MessageKind::User(msg) => {
                assert_eq!(msg.user, "U1");
                assert_eq!(msg.channel, "D1");
                assert_eq!(msg.text, "hello");
                assert_eq!(msg.ts.as_deref(), Some("1.2"));
                assert_eq!(msg.thread_ts, None);
            }
            other => panic!("expected User, got {other:?}"),
        }
    }

    #[test]
    fn bot_marker_wins_over_user_fields() {
        let kind = classify(&event(serde_json::json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
            "text": "hi",
            "bot_id": "B99",
        })));
        assert!(matches!(kind, MessageKind::Bot));
    }

    #[test]
    fn app_marker_classifies_as_app() {
        let kind = classify(&event(serde_json::json!({
            "type": "message",
            "channel": "C1",
            "app_id": "A42",
        })));
        assert!(matches!(kind, MessageKind::App));
    }

    #[test]
    fn subtype_classifies_as_system() {
        let kind = classify(&event(serde_json::json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
            "text": "left",
            "subtype": "channel_leave",
        })));
        assert!(matches!(kind, MessageKind::SystemSubtype));
    }

    #[test]
    fn missing_field_is_malformed() {
        let kind = classify(&event(serde_json::json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
        })));
        assert!(matches!(kind, MessageKind::Malformed));
    }

    #[test]
    fn envelope_decodes_url_verification() {
        let envelope: EventEnvelope = serde_json::from_str(
            r#"{"type": "url_verification", "challenge": "tok"}"#,
        )
        .unwrap();
        assert_eq!(envelope.kind, "url_verification");
        assert_eq!(envelope.challenge.as_deref(), Some("tok"));
        assert!(envelope.event.is_none());
    }
}

//! Webhook HTTP surface.
//!
//! Two routes share one handler pipeline and differ only in which AI
//! path answers: `/slack/events/assistant` runs the Assistants flow,
//! `/slack/events/chat` the single-turn completion flow. The body is
//! taken raw so the signature is computed over the exact bytes Slack
//! signed. The `url_verification` handshake is answered before the
//! signature gate; everything else must pass it.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::orchestrator::{AiMode, Orchestrator, WebhookReply};
use crate::signature::SignatureVerifier;
use crate::slack::events::EventEnvelope;

#[derive(Clone)]
pub struct WebhookState {
    pub verifier: Arc<SignatureVerifier>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/slack/events/assistant", post(assistant_events))
        .route("/slack/events/chat", post(chat_events))
        .with_state(state)
}

async fn assistant_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    handle_event(state, headers, body, AiMode::Assistant).await
}

async fn chat_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    handle_event(state, headers, body, AiMode::Chat).await
}

async fn handle_event(
    state: WebhookState,
    headers: HeaderMap,
    body: String,
    mode: AiMode,
) -> (StatusCode, Json<serde_json::Value>) {
    let envelope = serde_json::from_str::<EventEnvelope>(&body).ok();

    // Slack's one-time URL handshake carries no signature yet.
    if let Some(envelope) = &envelope {
        if envelope.kind == "url_verification" {
            if let Some(challenge) = &envelope.challenge {
                return (StatusCode::OK, Json(json!({"challenge": challenge})));
            }
        }
    }

    let signature = header_str(&headers, "x-slack-signature");
    let timestamp = header_str(&headers, "x-slack-request-timestamp");
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return unauthorized("Missing signature or timestamp");
    };

    if !state.verifier.is_fresh(timestamp, Utc::now()) {
        return unauthorized("Request timestamp too old");
    }

    if !state.verifier.verify(timestamp, &body, signature) {
        return unauthorized("Invalid signature");
    }

    let Some(envelope) = envelope else {
        debug!("Discarding unparseable event body");
        return (
            StatusCode::OK,
            Json(json!({"message": "Event type not handled"})),
        );
    };

    match state.orchestrator.handle_envelope(envelope, mode) {
        WebhookReply::Challenge(challenge) => {
            (StatusCode::OK, Json(json!({"challenge": challenge})))
        }
        WebhookReply::Status(message) => (StatusCode::OK, Json(json!({"message": message}))),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn unauthorized(error: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": error})))
}

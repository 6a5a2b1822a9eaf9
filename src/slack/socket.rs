//! Slack Socket Mode transport.
//!
//! Alternative to the webhook: open a websocket via
//! `apps.connections.open`, ack every `events_api` envelope by its
//! `envelope_id`, and feed the payload through the same orchestrator
//! path. Socket events are authenticated by the app-level token, so no
//! signature check applies. A `disconnect` frame or a dropped stream
//! ends the session and the outer loop reconnects.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::orchestrator::{AiMode, Orchestrator};
use crate::slack::client::SLACK_API_BASE;
use crate::slack::events::EventEnvelope;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(rename = "type")]
    kind: String,
    envelope_id: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenConnectionResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

pub struct SocketModeClient {
    http: reqwest::Client,
    api_base: String,
    app_token: SecretString,
    orchestrator: Arc<Orchestrator>,
    mode: AiMode,
}

impl SocketModeClient {
    pub fn new(app_token: SecretString, orchestrator: Arc<Orchestrator>, mode: AiMode) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: SLACK_API_BASE.to_string(),
            app_token,
            orchestrator,
            mode,
        }
    }

    /// Connect and process events until the process exits, reconnecting
    /// after disconnects and transport errors.
    pub async fn run(&self) {
        loop {
            match self.open_connection().await {
                Ok(url) => {
                    info!("Socket Mode connected");
                    if let Err(e) = self.run_session(&url).await {
                        warn!(error = %e, "Socket Mode session ended");
                    }
                }
                Err(e) => warn!(error = %e, "Socket Mode connection failed"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn open_connection(&self) -> anyhow::Result<String> {
        let response: OpenConnectionResponse = self
            .http
            .post(format!("{}/apps.connections.open", self.api_base))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .context("apps.connections.open request failed")?
            .json()
            .await
            .context("apps.connections.open returned invalid JSON")?;

        if !response.ok {
            bail!(
                "apps.connections.open failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        response
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("apps.connections.open did not return a url"))
    }

    async fn run_session(&self, socket_url: &str) -> anyhow::Result<()> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("websocket connect failed")?;
        let (mut sink, mut source) = stream.split();

        while let Some(message) = source.next().await {
            let message = message.context("websocket read failed")?;
            match message {
                WsMessage::Text(_) | WsMessage::Binary(_) => {
                    let Some(envelope) = parse_envelope(&message) else {
                        continue;
                    };
                    // Ack first so Slack does not redeliver while the
                    // orchestrator spawns processing.
                    if let Some(envelope_id) = &envelope.envelope_id {
                        let ack = json!({"envelope_id": envelope_id}).to_string();
                        sink.send(WsMessage::text(ack))
                            .await
                            .context("websocket ack failed")?;
                    }
                    match envelope.kind.as_str() {
                        "hello" => debug!("Socket Mode hello"),
                        "disconnect" => {
                            info!("Socket Mode disconnect requested; reconnecting");
                            return Ok(());
                        }
                        "events_api" => self.dispatch(envelope.payload),
                        other => debug!(kind = %other, "Ignoring socket envelope"),
                    }
                }
                WsMessage::Ping(data) => {
                    sink.send(WsMessage::Pong(data))
                        .await
                        .context("websocket pong failed")?;
                }
                WsMessage::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    fn dispatch(&self, payload: serde_json::Value) {
        match serde_json::from_value::<EventEnvelope>(payload) {
            Ok(event) => {
                Arc::clone(&self.orchestrator).handle_envelope(event, self.mode);
            }
            Err(e) => warn!(error = %e, "Undecodable events_api payload"),
        }
    }
}

fn parse_envelope(message: &WsMessage) -> Option<SocketEnvelope> {
    let text = match message {
        WsMessage::Text(text) => text.as_str(),
        WsMessage::Binary(bytes) => std::str::from_utf8(bytes).ok()?,
        _ => return None,
    };
    match serde_json::from_str(text) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!(error = %e, "Undecodable socket frame");
            None
        }
    }
}

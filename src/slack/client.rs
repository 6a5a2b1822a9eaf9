//! Slack Web API client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::SlackError;

/// Production Web API endpoint.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Outbound chat operations the relay performs against the messaging
/// platform. Object-safe so delivery and orchestration can be exercised
/// with recording stubs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Post a message, optionally threaded. Returns the message `ts`.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackError>;

    /// Overwrite an existing message in place.
    async fn update_message(&self, channel: &str, ts: &str, text: &str)
    -> Result<(), SlackError>;

    /// Move the bot's read cursor in a conversation.
    async fn mark_read(&self, channel: &str, ts: &str) -> Result<(), SlackError>;
}

/// `chat.*` response envelope. Slack reports failures in-band:
/// HTTP 200 with `ok: false` and an `error` code.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    ok: bool,
    ts: Option<String>,
    error: Option<String>,
}

/// reqwest-backed Slack Web API client.
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: SecretString,
}

impl SlackClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_api_base(bot_token, SLACK_API_BASE)
    }

    /// Point the client at a different API base (tests).
    pub fn with_api_base(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
        }
    }

    async fn call(&self, method: &str, payload: &Value) -> Result<ChatResponse, SlackError> {
        let resp = self
            .http
            .post(format!("{}/{method}", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| SlackError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SlackError::Api {
                method: method.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }

        let decoded: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SlackError::Api {
                method: method.to_string(),
                reason: format!("decode failed: {e}"),
            })?;

        if !decoded.ok {
            return Err(SlackError::Api {
                method: method.to_string(),
                reason: decoded.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(decoded)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackError> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let resp = self.call("chat.postMessage", &payload).await?;
        let ts = resp.ts.ok_or_else(|| SlackError::MissingField {
            method: "chat.postMessage".to_string(),
            field: "ts".to_string(),
        })?;
        debug!(channel = %channel, ts = %ts, "Message posted");
        Ok(ts)
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        let payload = json!({
            "channel": channel,
            "ts": ts,
            "text": text,
        });
        self.call("chat.update", &payload).await?;
        debug!(channel = %channel, ts = %ts, "Message updated");
        Ok(())
    }

    async fn mark_read(&self, channel: &str, ts: &str) -> Result<(), SlackError> {
        let payload = json!({
            "channel": channel,
            "ts": ts,
        });
        self.call("conversations.mark", &payload).await?;
        Ok(())
    }
}

//! OpenAI gateway.
//!
//! Implements the Assistants v2 conversation flow (append message,
//! create run, poll to a terminal status, fetch the reply) and a
//! single-turn chat-completions path. Run polling is bounded: the
//! interval backs off exponentially from 500 ms up to 5 s and the whole
//! run is abandoned after 120 s with [`OpenAiError::Timeout`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::OpenAiError;
use crate::normalize::strip_citations;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const MODEL: &str = "gpt-4o-mini";
const ASSISTANT_NAME: &str = "HR Assistant";
const ASSISTANT_INSTRUCTIONS: &str = "You are a helpful HR assistant. Answer questions about salary, policies, leave, and other HR-related topics based on the provided documentation. Be concise, accurate, and professional.";
const CHAT_SYSTEM_PROMPT: &str = "You are a helpful HR assistant. Answer questions about salary, policies, leave, and other HR-related topics. Be concise, accurate, and professional.";

const POLL_BASE: Duration = Duration::from_millis(500);
const POLL_CAP: Duration = Duration::from_secs(5);
const RUN_DEADLINE: Duration = Duration::from_secs(120);

/// Conversation backend seam. The orchestrator and router only see this
/// trait, so tests swap in stubs.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Create an empty conversation thread and return its id.
    async fn create_thread(&self) -> Result<String, OpenAiError>;

    /// Ask within an existing thread (DM conversations keep context).
    async fn ask_stateful(&self, thread_id: &str, message: &str) -> Result<String, OpenAiError>;

    /// Ask on a fresh throwaway thread (channel messages carry no context).
    async fn ask_stateless(&self, message: &str) -> Result<String, OpenAiError>;

    /// Single-turn chat completion with the fixed persona prompt.
    async fn chat_completion(&self, message: &str) -> Result<String, OpenAiError>;
}

// ── Wire types ──

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunState {
    status: String,
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

// ── Gateway ──

pub struct OpenAiGateway {
    http: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    /// Assistant id from configuration, when provided.
    configured_assistant: Option<String>,
    /// Lazily created assistant id, cached for the process lifetime.
    assistant_id: OnceCell<String>,
    poll_base: Duration,
    poll_cap: Duration,
    run_deadline: Duration,
}

impl OpenAiGateway {
    pub fn new(api_key: SecretString, assistant_id: Option<String>) -> Self {
        Self::with_api_base(api_key, assistant_id, OPENAI_API_BASE)
    }

    pub fn with_api_base(
        api_key: SecretString,
        assistant_id: Option<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key,
            configured_assistant: assistant_id,
            assistant_id: OnceCell::new(),
            poll_base: POLL_BASE,
            poll_cap: POLL_CAP,
            run_deadline: RUN_DEADLINE,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        operation: &str,
    ) -> Result<reqwest::Response, OpenAiError> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, path))
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "assistants=v2")
            .json(&body)
            .send()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;
        Self::check_status(response, operation).await
    }

    async fn get(&self, path: &str, operation: &str) -> Result<reqwest::Response, OpenAiError> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_base, path))
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;
        Self::check_status(response, operation).await
    }

    async fn check_status(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, OpenAiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(OpenAiError::Api {
            operation: operation.to_string(),
            reason: format!("HTTP {status}: {body}"),
        })
    }

    /// Configured assistant id, else create one and cache it for the
    /// process lifetime.
    async fn assistant_id(&self) -> Result<&str, OpenAiError> {
        if let Some(id) = &self.configured_assistant {
            return Ok(id);
        }
        let id = self
            .assistant_id
            .get_or_try_init(|| async {
                info!("Creating assistant");
                let created: ObjectId = self
                    .post(
                        "assistants",
                        json!({
                            "name": ASSISTANT_NAME,
                            "instructions": ASSISTANT_INSTRUCTIONS,
                            "model": MODEL,
                            "tools": [{"type": "file_search"}],
                        }),
                        "assistants.create",
                    )
                    .await?
                    .json()
                    .await
                    .map_err(|e| OpenAiError::Http(e.to_string()))?;
                Ok::<_, OpenAiError>(created.id)
            })
            .await?;
        Ok(id)
    }

    async fn append_user_message(
        &self,
        thread_id: &str,
        message: &str,
    ) -> Result<(), OpenAiError> {
        self.post(
            &format!("threads/{thread_id}/messages"),
            json!({"role": "user", "content": message}),
            "messages.create",
        )
        .await?;
        Ok(())
    }

    /// Create a run and poll it to a terminal status, then fetch the
    /// assistant's latest reply.
    async fn run_to_completion(&self, thread_id: &str) -> Result<String, OpenAiError> {
        let assistant_id = self.assistant_id().await?;
        let run: ObjectId = self
            .post(
                &format!("threads/{thread_id}/runs"),
                json!({"assistant_id": assistant_id}),
                "runs.create",
            )
            .await?
            .json()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;

        let started = Instant::now();
        let mut interval = self.poll_base;
        loop {
            let state: RunState = self
                .get(
                    &format!("threads/{thread_id}/runs/{}", run.id),
                    "runs.retrieve",
                )
                .await?
                .json()
                .await
                .map_err(|e| OpenAiError::Http(e.to_string()))?;

            match state.status.as_str() {
                "queued" | "in_progress" => {
                    if started.elapsed() >= self.run_deadline {
                        return Err(OpenAiError::Timeout {
                            deadline: self.run_deadline,
                        });
                    }
                    debug!(run_id = %run.id, status = %state.status, "Run pending");
                    tokio::time::sleep(interval).await;
                    interval = (interval * 3 / 2).min(self.poll_cap);
                }
                "completed" => return self.latest_assistant_text(thread_id).await,
                "failed" => {
                    let message = state
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(OpenAiError::RunFailed(message));
                }
                other => return Err(OpenAiError::UnexpectedRunStatus(other.to_string())),
            }
        }
    }

    async fn latest_assistant_text(&self, thread_id: &str) -> Result<String, OpenAiError> {
        let list: MessageList = self
            .get(
                &format!("threads/{thread_id}/messages?limit=1"),
                "messages.list",
            )
            .await?
            .json()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;

        let text = list
            .data
            .first()
            .and_then(|message| {
                message
                    .content
                    .iter()
                    .find(|content| content.kind == "text")
            })
            .and_then(|content| content.text.as_ref())
            .ok_or(OpenAiError::EmptyResponse)?;

        Ok(strip_citations(&text.value))
    }
}

#[async_trait]
impl AssistantBackend for OpenAiGateway {
    async fn create_thread(&self) -> Result<String, OpenAiError> {
        let thread: ObjectId = self
            .post("threads", json!({}), "threads.create")
            .await?
            .json()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;
        Ok(thread.id)
    }

    async fn ask_stateful(&self, thread_id: &str, message: &str) -> Result<String, OpenAiError> {
        self.append_user_message(thread_id, message).await?;
        self.run_to_completion(thread_id).await
    }

    async fn ask_stateless(&self, message: &str) -> Result<String, OpenAiError> {
        let thread_id = self.create_thread().await?;
        self.append_user_message(&thread_id, message).await?;
        self.run_to_completion(&thread_id).await
    }

    async fn chat_completion(&self, message: &str) -> Result<String, OpenAiError> {
        let completion: ChatCompletion = self
            .post(
                "chat/completions",
                json!({
                    "model": MODEL,
                    "messages": [
                        {"role": "system", "content": CHAT_SYSTEM_PROMPT},
                        {"role": "user", "content": message},
                    ],
                    "temperature": 0.7,
                }),
                "chat.completions",
            )
            .await?
            .json()
            .await
            .map_err(|e| OpenAiError::Http(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .map(|content| strip_citations(&content))
            .ok_or(OpenAiError::EmptyResponse)
    }
}

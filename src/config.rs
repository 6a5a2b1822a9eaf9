//! Environment-driven configuration.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Relay configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Slack signing secret for webhook signature verification.
    /// Optional: without it every webhook event is rejected.
    pub signing_secret: Option<SecretString>,
    /// Slack bot token (`xoxb-...`) for Web API calls.
    pub bot_token: SecretString,
    /// Slack app token (`xapp-...`). When set, Socket Mode is enabled.
    pub app_token: Option<SecretString>,
    /// OpenAI API key.
    pub openai_api_key: SecretString,
    /// Pre-provisioned assistant id. When absent, one is created lazily
    /// once per process and cached in memory.
    pub assistant_id: Option<String>,
    /// HTTP listen port for the webhook server.
    pub port: u16,
    /// Path to the local libSQL binding database.
    pub db_path: String,
}

impl Config {
    /// Read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require("SLACK_BOT_TOKEN")?;
        let openai_api_key = require("OPENAI_API_KEY")?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            signing_secret: optional("SLACK_SIGNING_SECRET").map(SecretString::from),
            bot_token: SecretString::from(bot_token),
            app_token: optional("SLACK_APP_TOKEN").map(SecretString::from),
            openai_api_key: SecretString::from(openai_api_key),
            assistant_id: optional("OPENAI_ASSISTANT_ID"),
            port,
            db_path: optional("SLACK_ASSIST_DB_PATH")
                .unwrap_or_else(|| "./data/slack-assist.db".to_string()),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

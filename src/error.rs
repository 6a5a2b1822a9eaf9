//! Error types for Slack Assist.

use std::time::Duration;

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] OpenAiError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Binding-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Slack Web API errors.
#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("Slack {method} failed: {reason}")]
    Api { method: String, reason: String },

    #[error("Slack {method} response missing {field}")]
    MissingField { method: String, field: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// OpenAI backend errors.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("OpenAI {operation} failed: {reason}")]
    Api { operation: String, reason: String },

    #[error("OpenAI run failed: {0}")]
    RunFailed(String),

    #[error("Unexpected run status: {0}")]
    UnexpectedRunStatus(String),

    #[error("Run did not complete within {deadline:?}")]
    Timeout { deadline: Duration },

    #[error("No response content from OpenAI")]
    EmptyResponse,

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;

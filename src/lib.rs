//! Slack Assist — Slack to OpenAI assistant relay.

pub mod chunk;
pub mod config;
pub mod error;
pub mod normalize;
pub mod openai;
pub mod orchestrator;
pub mod router;
pub mod signature;
pub mod slack;
pub mod store;

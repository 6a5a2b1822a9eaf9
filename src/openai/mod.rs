//! OpenAI backend: Assistants v2 flow and single-turn chat completions.

pub mod gateway;

pub use gateway::{AssistantBackend, OpenAiGateway};

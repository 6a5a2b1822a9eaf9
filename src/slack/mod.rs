//! Slack surface: event model, Web API client, delivery, transports.

pub mod client;
pub mod delivery;
pub mod events;
pub mod socket;
pub mod webhook;

pub use client::{ChatApi, SlackClient};
pub use delivery::{DeliveryEngine, DeliveryJob, ERROR_MESSAGE, THINKING_MESSAGE};
pub use events::{EventEnvelope, InboundMessage, MessageEvent, MessageKind};
pub use socket::SocketModeClient;
pub use webhook::{WebhookState, webhook_routes};

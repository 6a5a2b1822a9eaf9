//! Conversation routing: stateful DM threads, stateless everywhere else.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::openai::AssistantBackend;
use crate::store::BindingStore;

/// How a message's conversation context is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// DM: one persistent OpenAI thread per user.
    Stateful,
    /// Channel or group: every message stands alone.
    Stateless,
}

impl ProcessingMode {
    /// Slack DM channel ids start with `D`; everything else is treated
    /// as shared space.
    pub fn for_channel(channel: &str) -> Self {
        if channel.starts_with('D') {
            Self::Stateful
        } else {
            Self::Stateless
        }
    }
}

/// Resolves a user's persistent thread, creating and recording one on
/// first contact. Concurrent first contacts may both create a thread;
/// the upsert converges on the last writer and either empty thread is a
/// valid binding.
pub struct ConversationRouter {
    store: Arc<dyn BindingStore>,
    backend: Arc<dyn AssistantBackend>,
}

impl ConversationRouter {
    pub fn new(store: Arc<dyn BindingStore>, backend: Arc<dyn AssistantBackend>) -> Self {
        Self { store, backend }
    }

    pub async fn resolve_thread(&self, slack_user_id: &str) -> Result<String> {
        if let Some(thread_id) = self.store.find(slack_user_id).await? {
            return Ok(thread_id);
        }

        let thread_id = self.backend.create_thread().await?;
        debug!(user = %slack_user_id, thread = %thread_id, "Created thread for first contact");
        self.store.upsert(slack_user_id, &thread_id).await?;
        Ok(thread_id)
    }
}

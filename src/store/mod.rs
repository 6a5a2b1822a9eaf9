//! Persistence for user → assistant-thread bindings.

pub mod libsql;
pub mod memory;

pub use libsql::LibSqlStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Key-value store mapping a Slack user id to its durable OpenAI thread
/// id. At most one thread id is stored per user; concurrent first
/// contact converges by upsert (last writer wins — both racing threads
/// are equally valid empty conversations).
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Look up the thread id bound to a Slack user.
    async fn find(&self, slack_user_id: &str) -> Result<Option<String>, StoreError>;

    /// Insert or replace the binding for a Slack user.
    async fn upsert(&self, slack_user_id: &str, thread_id: &str) -> Result<(), StoreError>;
}

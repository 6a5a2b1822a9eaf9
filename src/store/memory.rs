//! In-memory `BindingStore` — used in tests and as a no-persistence fallback.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::BindingStore;

/// HashMap-backed binding store. Bindings do not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BindingStore for MemoryStore {
    async fn find(&self, slack_user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.get(slack_user_id).cloned())
    }

    async fn upsert(&self, slack_user_id: &str, thread_id: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .insert(slack_user_id.to_string(), thread_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_on_empty_store_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.find("U1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let store = MemoryStore::new();
        store.upsert("U1", "thread_a").await.unwrap();
        assert_eq!(store.find("U1").await.unwrap().as_deref(), Some("thread_a"));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_binding() {
        let store = MemoryStore::new();
        store.upsert("U1", "thread_a").await.unwrap();
        store.upsert("U1", "thread_b").await.unwrap();
        assert_eq!(store.find("U1").await.unwrap().as_deref(), Some("thread_b"));
    }
}

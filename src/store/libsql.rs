//! libSQL `BindingStore` backend — local file or in-memory database.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::BindingStore;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS slack_threads (
        slack_user_id TEXT PRIMARY KEY,
        thread_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

/// libSQL-backed binding store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("create connection: {e}")))?;

        let store = Self { conn };
        store.init_schema().await?;
        info!(path = %path.display(), "Binding store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("create connection: {e}")))?;

        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Open(format!("init schema: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl BindingStore for LibSqlStore {
    async fn find(&self, slack_user_id: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT thread_id FROM slack_threads WHERE slack_user_id = ?1",
                params![slack_user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("find: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let thread_id: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("find row parse: {e}")))?;
                Ok(Some(thread_id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("find: {e}"))),
        }
    }

    async fn upsert(&self, slack_user_id: &str, thread_id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO slack_threads (slack_user_id, thread_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3) \
                 ON CONFLICT(slack_user_id) DO UPDATE SET \
                 thread_id = excluded.thread_id, updated_at = excluded.updated_at",
                params![slack_user_id, thread_id, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert: {e}")))?;

        debug!(user = %slack_user_id, thread = %thread_id, "Binding upserted");
        Ok(())
    }
}

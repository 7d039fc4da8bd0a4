//! # Key/Value Backends
//!
//! The queue and the id counters each live in a single JSON document under a
//! fixed key. This module provides the storage seam they are written against.
//!
//! ```text
//! ┌──────────────────────────┐
//! │  PendingQueue / IdAlloc  │
//! └────────────┬─────────────┘
//!              │ Arc<dyn KeyValueStore>
//!      ┌───────┴────────┐
//!      ▼                ▼
//!  SqliteKvStore    MemoryKvStore
//!  (kv_store table)  (HashMap, tests)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::{DbError, DbResult};

/// Storage key of the pending-record collection.
pub const PENDING_RECORDS_KEY: &str = "pending_records";

/// Storage key of the submitter → counter mapping.
pub const USER_COUNTERS_KEY: &str = "user_counters";

/// A durable string key/value store.
///
/// `set` must be durable once it returns `Ok`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> DbResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> DbResult<()>;

    /// Removes a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> DbResult<()>;
}

// =============================================================================
// SQLite Backend
// =============================================================================

/// Key/value store on the `kv_store` table.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteKvStore { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        trace!(key = %key, found = value.is_some(), "kv get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        trace!(key = %key, bytes = value.len(), "kv set");
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        trace!(key = %key, "kv remove");
        Ok(())
    }
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// In-memory store for tests and dry runs.
///
/// Reads and writes can be made to fail independently to exercise the
/// storage-failure paths of the queue and the sync engine.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set`/`remove` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> DbResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(format!("{} rejected by memory store", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.check(&self.fail_reads, "read")?;
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> DbResult<()> {
        self.check(&self.fail_writes, "write")?;
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.check(&self.fail_writes, "write")?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_sqlite_set_get_overwrite_remove() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let kv = db.kv_store();

        assert_eq!(kv.get("k").await.unwrap(), None);

        kv.set("k", "one".into()).await.unwrap();
        kv.set("k", "two".into()).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("two"));

        kv.remove("k").await.unwrap();
        kv.remove("k").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sqlite_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.kv_store().set(USER_COUNTERS_KEY, "{\"A\":3}".into()).await.unwrap();
        db.close().await;

        let reopened = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(
            reopened.kv_store().get(USER_COUNTERS_KEY).await.unwrap().as_deref(),
            Some("{\"A\":3}")
        );
    }

    #[tokio::test]
    async fn test_closed_pool_fails() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let kv = db.kv_store();
        db.close().await;

        assert!(kv.get("k").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_failure_switches() {
        let kv = MemoryKvStore::new();
        kv.set("k", "v".into()).await.unwrap();

        kv.set_fail_writes(true);
        assert!(matches!(kv.set("k", "w".into()).await, Err(DbError::Unavailable(_))));
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));

        kv.set_fail_reads(true);
        assert!(kv.get("k").await.is_err());
    }
}

//! # Registration Id Allocator
//!
//! Durable, per-submitter, gapless counters.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  next(Some("T01-U02"))                                                  │
//! │       │                                                                 │
//! │       ▼  (allocator lock held)                                          │
//! │  load  user_counters      {"T01-U02": 6, "T02-U01": 12}                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bump  T01-U02 → 7                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store user_counters      {"T01-U02": 7, "T02-U01": 12}                │
//! │       │                                                                 │
//! │       ▼  only after the store succeeded                                 │
//! │  return "T01-U02-0007"                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! If the store fails the caller gets an error and the counter is unchanged,
//! so the next successful call returns the same number.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::kv::{KeyValueStore, USER_COUNTERS_KEY};
use inventory_core::RegistrationId;

type CounterState = BTreeMap<String, u64>;

/// Issues registration ids. Clones share the same lock.
#[derive(Clone)]
pub struct IdAllocator {
    backend: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl IdAllocator {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        IdAllocator {
            backend,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Allocates the next registration id for a submitter.
    ///
    /// A missing or blank submitter gets a time-based fallback id and leaves
    /// the counters untouched.
    pub async fn next(&self, submitter_id: Option<&str>) -> DbResult<RegistrationId> {
        let submitter = match submitter_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s,
            None => {
                let id = RegistrationId::fallback(Utc::now());
                warn!(registration_id = %id, "No submitter on capture, using fallback id");
                return Ok(id);
            }
        };

        let _guard = self.lock.lock().await;

        let mut state = self.load().await?;
        let counter = state.get(submitter).copied().unwrap_or(0) + 1;
        state.insert(submitter.to_string(), counter);
        self.store(&state).await?;

        let id = RegistrationId::allocated(submitter, counter);
        debug!(submitter = %submitter, registration_id = %id, "Allocated registration id");
        Ok(id)
    }

    /// Last counter issued to a submitter (0 if none).
    pub async fn last_issued(&self, submitter_id: &str) -> DbResult<u64> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(submitter_id).copied().unwrap_or(0))
    }

    /// All counters, ordered by submitter.
    pub async fn snapshot(&self) -> DbResult<CounterState> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Clears every counter. Ids issued afterwards restart at 1 and can
    /// collide with ids the service already holds.
    pub async fn reset(&self) -> DbResult<()> {
        let _guard = self.lock.lock().await;
        self.backend.remove(USER_COUNTERS_KEY).await?;
        info!("Registration counters reset");
        Ok(())
    }

    async fn load(&self) -> DbResult<CounterState> {
        match self.backend.get(USER_COUNTERS_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| DbError::corrupt(USER_COUNTERS_KEY, e)),
            None => Ok(CounterState::new()),
        }
    }

    async fn store(&self, state: &CounterState) -> DbResult<()> {
        let raw = serde_json::to_string(state).map_err(|e| DbError::corrupt(USER_COUNTERS_KEY, e))?;
        self.backend.set(USER_COUNTERS_KEY, raw).await
    }
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator").finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use crate::pool::{Database, DbConfig};

    fn allocator() -> (Arc<MemoryKvStore>, IdAllocator) {
        let store = Arc::new(MemoryKvStore::new());
        let ids = IdAllocator::new(store.clone());
        (store, ids)
    }

    #[tokio::test]
    async fn test_sequential_ids_for_one_submitter() {
        let (_, ids) = allocator();

        let issued: Vec<String> = vec![
            ids.next(Some("T01-U02")).await.unwrap().to_string(),
            ids.next(Some("T01-U02")).await.unwrap().to_string(),
            ids.next(Some("T01-U02")).await.unwrap().to_string(),
        ];

        assert_eq!(issued, vec!["T01-U02-0001", "T01-U02-0002", "T01-U02-0003"]);
    }

    #[tokio::test]
    async fn test_submitters_are_independent() {
        let (_, ids) = allocator();

        ids.next(Some("A")).await.unwrap();
        ids.next(Some("A")).await.unwrap();
        let b = ids.next(Some("B")).await.unwrap();

        assert_eq!(b.as_str(), "B-0001");
        assert_eq!(ids.last_issued("A").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_counters_continue_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let ids = IdAllocator::new(Arc::new(db.kv_store()));
        ids.next(Some("T01-U02")).await.unwrap();
        ids.next(Some("T01-U02")).await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let ids = IdAllocator::new(Arc::new(db.kv_store()));
        assert_eq!(ids.next(Some("T01-U02")).await.unwrap().as_str(), "T01-U02-0003");
    }

    #[tokio::test]
    async fn test_missing_submitter_gets_fallback() {
        let (_, ids) = allocator();

        let none = ids.next(None).await.unwrap();
        let blank = ids.next(Some("   ")).await.unwrap();

        assert!(none.is_fallback());
        assert!(blank.is_fallback());
        assert!(ids.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_does_not_leave_a_gap() {
        let (store, ids) = allocator();
        ids.next(Some("A")).await.unwrap();

        store.set_fail_writes(true);
        assert!(ids.next(Some("A")).await.is_err());

        store.set_fail_writes(false);
        assert_eq!(ids.next(Some("A")).await.unwrap().as_str(), "A-0002");
    }

    #[tokio::test]
    async fn test_corrupt_counters_fail_closed() {
        let (store, ids) = allocator();
        store.set(USER_COUNTERS_KEY, "not json".into()).await.unwrap();

        assert!(matches!(
            ids.next(Some("A")).await,
            Err(DbError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_restarts_at_one() {
        let (_, ids) = allocator();
        ids.next(Some("A")).await.unwrap();
        ids.next(Some("A")).await.unwrap();

        ids.reset().await.unwrap();

        assert_eq!(ids.next(Some("A")).await.unwrap().as_str(), "A-0001");
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_gapless() {
        let (_, ids) = allocator();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move { ids.next(Some("T01-U02")).await }));
        }

        let mut counters = Vec::new();
        for handle in handles {
            let id = handle.await.unwrap().unwrap();
            counters.push(id.parts().unwrap().1);
        }
        counters.sort_unstable();

        assert_eq!(counters, (1..=25).collect::<Vec<u64>>());
    }
}

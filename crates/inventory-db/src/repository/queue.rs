//! # Pending Queue
//!
//! The durable, deduplicated list of captures waiting for delivery.
//!
//! ## Single-Writer Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One lock, whole-document writes                      │
//! │                                                                         │
//! │   form submit ──► enqueue ─────┐                                       │
//! │   sync pass   ──► list ────────┤                                       │
//! │   sync pass   ──► remove_many ─┼──► queue lock ──► load JSON           │
//! │   startup     ──► repair ──────┤                  modify in memory     │
//! │   admin       ──► purge_all ───┘                  store JSON           │
//! │                                                                         │
//! │   Every operation reads the collection fresh under the lock, so two    │
//! │   concurrent submissions can never overwrite each other.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All clones of a `PendingQueue` share the lock. Build one per backend and
//! clone it; two independently constructed queues over the same backend do
//! not exclude each other.
//!
//! ## Enqueue
//! ```text
//!   draft ──► signature ──► already queued? ──yes──► Duplicate (no change)
//!                                │
//!                                no
//!                                ▼
//!                 temp id + created_at + registration id
//!                                ▼
//!                       append, store whole list ──► Queued(record)
//! ```

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::kv::{KeyValueStore, PENDING_RECORDS_KEY};
use crate::repository::counters::IdAllocator;
use inventory_core::{new_temp_id, DedupSignature, PendingRecord, RecordDraft, RegistrationId};

/// Result of an enqueue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The record was appended and persisted.
    Queued(PendingRecord),
    /// A record with the same dedup signature is already waiting.
    Duplicate {
        /// Registration id of the record already in the queue.
        existing: RegistrationId,
    },
}

impl EnqueueOutcome {
    /// `true` when the record was added.
    pub fn accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued(_))
    }
}

/// Durable queue of pending records.
#[derive(Clone)]
pub struct PendingQueue {
    backend: Arc<dyn KeyValueStore>,
    ids: IdAllocator,
    lock: Arc<Mutex<()>>,
}

impl PendingQueue {
    /// Creates a queue (and its id allocator) over a backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        PendingQueue {
            ids: IdAllocator::new(backend.clone()),
            backend,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The allocator this queue draws registration ids from.
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Adds a capture unless an identical one is already waiting.
    ///
    /// A registration id is allocated only when the record is accepted.
    pub async fn enqueue(&self, draft: RecordDraft) -> DbResult<EnqueueOutcome> {
        self.insert(draft, None).await
    }

    /// Adds a capture that already carries a registration id, e.g. after a
    /// direct send failed. The id is kept as-is; no new one is allocated.
    pub async fn enqueue_with_id(
        &self,
        draft: RecordDraft,
        registration_id: RegistrationId,
    ) -> DbResult<EnqueueOutcome> {
        self.insert(draft, Some(registration_id)).await
    }

    async fn insert(
        &self,
        draft: RecordDraft,
        registration_id: Option<RegistrationId>,
    ) -> DbResult<EnqueueOutcome> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let signature = draft.signature();

        if let Some(existing) = records.iter().find(|r| r.signature() == signature) {
            info!(
                registration_id = %existing.registration_id(),
                serial = %draft.serial_number,
                "Capture already queued, rejecting duplicate"
            );
            return Ok(EnqueueOutcome::Duplicate {
                existing: existing.registration_id().clone(),
            });
        }

        let registration_id = match registration_id {
            Some(id) => id,
            None => self.ids.next(draft.submitter()).await?,
        };

        let record = PendingRecord::new(draft, new_temp_id(), registration_id, Utc::now());
        records.push(record.clone());
        self.store(&records).await?;

        info!(
            temp_id = %record.temp_id(),
            registration_id = %record.registration_id(),
            pending = records.len(),
            "Capture queued"
        );

        Ok(EnqueueOutcome::Queued(record))
    }

    /// Every pending record in insertion order.
    ///
    /// The returned list is a point-in-time copy; later enqueues don't show
    /// up in it.
    pub async fn list(&self) -> DbResult<Vec<PendingRecord>> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;

        let duplicates = records.len() - distinct_signatures(&records);
        if duplicates > 0 {
            warn!(
                duplicates,
                "Pending queue holds duplicate captures; run repair to clean up"
            );
        }

        Ok(records)
    }

    /// Removes every record whose temp id is in `temp_ids`.
    ///
    /// Unknown ids are ignored. Returns how many records were removed.
    pub async fn remove_many(&self, temp_ids: &HashSet<String>) -> DbResult<usize> {
        if temp_ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| !temp_ids.contains(r.temp_id()));
        let removed = before - records.len();

        if removed > 0 {
            self.store(&records).await?;
        }

        debug!(requested = temp_ids.len(), removed, "Removed delivered records");
        Ok(removed)
    }

    /// Keeps the first record of each dedup signature and deletes the rest.
    ///
    /// Returns the number of records deleted.
    pub async fn repair_duplicates(&self) -> DbResult<usize> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let before = records.len();

        let mut seen: HashSet<DedupSignature> = HashSet::new();
        records.retain(|r| {
            let keep = seen.insert(r.signature());
            if !keep {
                debug!(
                    temp_id = %r.temp_id(),
                    registration_id = %r.registration_id(),
                    "Dropping duplicate capture"
                );
            }
            keep
        });

        let removed = before - records.len();
        if removed > 0 {
            self.store(&records).await?;
            warn!(removed, remaining = records.len(), "Repaired duplicate captures");
        }

        Ok(removed)
    }

    /// Deletes every pending record. Returns how many were discarded.
    pub async fn purge_all(&self) -> DbResult<usize> {
        let _guard = self.lock.lock().await;

        let discarded = self.load().await?.len();
        self.backend.remove(PENDING_RECORDS_KEY).await?;

        warn!(discarded, "Pending queue purged");
        Ok(discarded)
    }

    /// Number of pending records.
    pub async fn count(&self) -> DbResult<usize> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.len())
    }

    async fn load(&self) -> DbResult<Vec<PendingRecord>> {
        match self.backend.get(PENDING_RECORDS_KEY).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| DbError::corrupt(PENDING_RECORDS_KEY, e))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn store(&self, records: &[PendingRecord]) -> DbResult<()> {
        let raw =
            serde_json::to_string(records).map_err(|e| DbError::corrupt(PENDING_RECORDS_KEY, e))?;
        self.backend.set(PENDING_RECORDS_KEY, raw).await
    }
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue").finish_non_exhaustive()
    }
}

fn distinct_signatures(records: &[PendingRecord]) -> usize {
    records
        .iter()
        .map(PendingRecord::signature)
        .collect::<HashSet<_>>()
        .len()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use inventory_core::{AssetStatus, Assignee};

    fn draft(serial: &str) -> RecordDraft {
        RecordDraft {
            asset_type: "Laptop".into(),
            model: "ThinkPad T14".into(),
            serial_number: serial.into(),
            inventory_number: "INV-1000".into(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            assignee: Assignee::ExistingEmployee {
                employee_id: "4521".into(),
            },
            location: "Edificio principal".into(),
            assigned_area: Some("Sistemas".into()),
            status: AssetStatus::Active,
            capture_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            submitter_id: Some("T01-U02".into()),
            submitter_name: None,
            territorial: Some("Territorial 1".into()),
        }
    }

    fn queue() -> (Arc<MemoryKvStore>, PendingQueue) {
        let store = Arc::new(MemoryKvStore::new());
        let queue = PendingQueue::new(store.clone());
        (store, queue)
    }

    /// Writes records straight to the backend, bypassing dedup.
    async fn seed(store: &MemoryKvStore, drafts: &[RecordDraft]) -> Vec<PendingRecord> {
        let records: Vec<PendingRecord> = drafts
            .iter()
            .enumerate()
            .map(|(i, d)| {
                PendingRecord::new(
                    d.clone(),
                    format!("temp_{}", i),
                    RegistrationId::allocated("T01-U02", i as u64 + 1),
                    Utc::now(),
                )
            })
            .collect();
        store
            .set(PENDING_RECORDS_KEY, serde_json::to_string(&records).unwrap())
            .await
            .unwrap();
        records
    }

    #[tokio::test]
    async fn test_enqueue_assigns_ids() {
        let (_, queue) = queue();

        let outcome = queue.enqueue(draft("SN-001")).await.unwrap();
        let EnqueueOutcome::Queued(record) = outcome else {
            panic!("expected Queued");
        };

        assert!(record.temp_id().starts_with("temp_"));
        assert_eq!(record.registration_id().as_str(), "T01-U02-0001");
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_rejected_without_mutation() {
        let (_, queue) = queue();

        assert!(queue.enqueue(draft("SN-001")).await.unwrap().accepted());
        assert!(queue.enqueue(draft("SN-002")).await.unwrap().accepted());

        let again = queue.enqueue(draft("SN-001")).await.unwrap();
        assert_eq!(
            again,
            EnqueueOutcome::Duplicate {
                existing: RegistrationId::allocated("T01-U02", 1)
            }
        );
        assert_eq!(queue.count().await.unwrap(), 2);

        // Rejected captures don't consume a counter.
        assert_eq!(queue.ids().last_issued("T01-U02").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_check_ignores_case() {
        let (_, queue) = queue();
        queue.enqueue(draft("SN-001")).await.unwrap();

        let mut shouted = draft("sn-001");
        shouted.asset_type = "LAPTOP".into();

        assert!(!queue.enqueue(shouted).await.unwrap().accepted());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let (_, queue) = queue();
        for serial in ["C", "A", "B"] {
            queue.enqueue(draft(serial)).await.unwrap();
        }

        let serials: Vec<String> = queue
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.record().serial_number.clone())
            .collect();
        assert_eq!(serials, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_enqueue_with_id_keeps_the_id() {
        let (_, queue) = queue();
        let id = queue.ids().next(Some("T01-U02")).await.unwrap();

        let outcome = queue.enqueue_with_id(draft("SN-001"), id.clone()).await.unwrap();
        let EnqueueOutcome::Queued(record) = outcome else {
            panic!("expected Queued");
        };

        assert_eq!(record.registration_id(), &id);
        assert_eq!(queue.ids().last_issued("T01-U02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_many_is_idempotent() {
        let (_, queue) = queue();
        for serial in ["1", "2", "3"] {
            queue.enqueue(draft(serial)).await.unwrap();
        }
        let records = queue.list().await.unwrap();

        let ids: HashSet<String> = [
            records[0].temp_id().to_string(),
            records[2].temp_id().to_string(),
            "temp_unknown".to_string(),
        ]
        .into_iter()
        .collect();

        assert_eq!(queue.remove_many(&ids).await.unwrap(), 2);
        let after_once = queue.list().await.unwrap();

        assert_eq!(queue.remove_many(&ids).await.unwrap(), 0);
        let after_twice = queue.list().await.unwrap();

        assert_eq!(after_once, after_twice);
        assert_eq!(after_twice.len(), 1);
        assert_eq!(after_twice[0].record().serial_number, "2");
    }

    #[tokio::test]
    async fn test_repair_keeps_earliest_of_each_signature() {
        let (store, queue) = queue();
        let seeded = seed(
            &store,
            &[
                draft("A"),
                draft("B"),
                draft("A"),
                draft("C"),
                draft("b"),
            ],
        )
        .await;

        // 5 records, 3 distinct signatures.
        assert_eq!(queue.repair_duplicates().await.unwrap(), 2);

        let kept: Vec<String> = queue
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.temp_id().to_string())
            .collect();
        assert_eq!(
            kept,
            vec![
                seeded[0].temp_id().to_string(),
                seeded[1].temp_id().to_string(),
                seeded[3].temp_id().to_string(),
            ]
        );

        assert_eq!(queue.repair_duplicates().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_all() {
        let (_, queue) = queue();
        queue.enqueue(draft("1")).await.unwrap();
        queue.enqueue(draft("2")).await.unwrap();

        assert_eq!(queue.purge_all().await.unwrap(), 2);
        assert_eq!(queue.count().await.unwrap(), 0);
        assert!(queue.enqueue(draft("1")).await.unwrap().accepted());
    }

    #[tokio::test]
    async fn test_storage_failure_changes_nothing() {
        let (store, queue) = queue();
        queue.enqueue(draft("1")).await.unwrap();

        store.set_fail_writes(true);
        assert!(queue.enqueue(draft("2")).await.is_err());

        store.set_fail_writes(false);
        assert_eq!(queue.count().await.unwrap(), 1);

        store.set_fail_reads(true);
        assert!(queue.list().await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_queue_is_an_error() {
        let (store, queue) = queue();
        store.set(PENDING_RECORDS_KEY, "[{".into()).await.unwrap();

        assert!(matches!(queue.count().await, Err(DbError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_are_not_lost() {
        let (_, queue) = queue();

        let mut handles = Vec::new();
        for i in 0..20 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(draft(&format!("SN-{:03}", i))).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().accepted());
        }

        let records = queue.list().await.unwrap();
        assert_eq!(records.len(), 20);

        let mut counters: Vec<u64> = records
            .iter()
            .map(|r| r.registration_id().parts().unwrap().1)
            .collect();
        counters.sort_unstable();
        assert_eq!(counters, (1..=20).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let queue = PendingQueue::new(Arc::new(db.kv_store()));
        queue.enqueue(draft("1")).await.unwrap();
        queue.enqueue(draft("2")).await.unwrap();
        db.close().await;

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let queue = PendingQueue::new(Arc::new(db.kv_store()));
        assert_eq!(queue.count().await.unwrap(), 2);

        let EnqueueOutcome::Queued(third) = queue.enqueue(draft("3")).await.unwrap() else {
            panic!("expected Queued");
        };
        assert_eq!(third.registration_id().as_str(), "T01-U02-0003");
    }
}

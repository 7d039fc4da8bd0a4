//! # Submission Service
//!
//! What happens when the user presses "save" on a capture.
//!
//! ```text
//!                        submit(draft)
//!                             │
//!                    probe_reachable()?
//!               ┌─────────────┴─────────────┐
//!             false                        true
//!               │                           │
//!         enqueue(draft)          same signature already queued?
//!               │                    ┌──────┴──────┐
//!               │                   yes            no
//!               │                    │             │
//!               │              AlreadyQueued   ids.next(submitter)
//!               │                                  │
//!               │                         register_asset(record)
//!               │              ┌───────────────────┼─────────────────────┐
//!               │             Ok          Validation error     Network / server /
//!               │              │                  │              unknown error
//!               │          Delivered          Rejected                 │
//!               │                          (not queued)   enqueue_with_id(draft, id)
//!               ▼                                                      ▼
//!       Queued | AlreadyQueued                                Queued | AlreadyQueued
//! ```
//!
//! A record routed to the queue after a failed direct send keeps the
//! registration id it was sent with, so the service sees the same id on
//! every attempt.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use inventory_core::{new_temp_id, PendingRecord, RecordDraft, RegistrationId};
use inventory_db::{EnqueueOutcome, PendingQueue};

use crate::connectivity::ReachabilityProbe;
use crate::error::SyncResult;
use crate::remote::{InventoryRemote, RemoteFailure};

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The service accepted the record directly.
    Delivered {
        registration_id: RegistrationId,
        payload: serde_json::Value,
    },
    /// The record was saved locally and will be sent by a later pass.
    Queued(PendingRecord),
    /// An identical capture is already waiting; nothing was added.
    AlreadyQueued { existing: RegistrationId },
    /// The service refused the record's content. It was not queued.
    Rejected {
        registration_id: RegistrationId,
        failure: RemoteFailure,
    },
}

impl SubmissionOutcome {
    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            SubmissionOutcome::Delivered { registration_id, .. } => {
                format!("Registered {} with the inventory service.", registration_id)
            }
            SubmissionOutcome::Queued(record) => format!(
                "Saved offline as {}. It will be sent when the service is reachable.",
                record.registration_id()
            ),
            SubmissionOutcome::AlreadyQueued { existing } => format!(
                "This capture is already queued as {}; nothing was added.",
                existing
            ),
            SubmissionOutcome::Rejected { failure, .. } => {
                format!("{}. Correct the capture and submit again.", failure)
            }
        }
    }

    /// `true` if the record is now either delivered or safely queued.
    pub fn is_saved(&self) -> bool {
        matches!(
            self,
            SubmissionOutcome::Delivered { .. } | SubmissionOutcome::Queued(_)
        )
    }
}

impl From<EnqueueOutcome> for SubmissionOutcome {
    fn from(outcome: EnqueueOutcome) -> Self {
        match outcome {
            EnqueueOutcome::Queued(record) => SubmissionOutcome::Queued(record),
            EnqueueOutcome::Duplicate { existing } => SubmissionOutcome::AlreadyQueued { existing },
        }
    }
}

/// Send-or-enqueue front door.
#[derive(Clone)]
pub struct SubmissionService {
    queue: PendingQueue,
    remote: Arc<dyn InventoryRemote>,
    prober: Arc<dyn ReachabilityProbe>,
}

impl SubmissionService {
    pub fn new(
        queue: PendingQueue,
        remote: Arc<dyn InventoryRemote>,
        prober: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        SubmissionService {
            queue,
            remote,
            prober,
        }
    }

    /// Sends the capture now if the service answers, otherwise queues it.
    ///
    /// Returns an error only when local storage fails; in that case the
    /// capture was neither sent nor saved.
    pub async fn submit(&self, draft: RecordDraft) -> SyncResult<SubmissionOutcome> {
        if !self.prober.probe_reachable().await {
            info!(serial = %draft.serial_number, "Service unreachable, queueing capture");
            return Ok(self.queue.enqueue(draft).await?.into());
        }

        let signature = draft.signature();
        if let Some(existing) = self
            .queue
            .list()
            .await?
            .into_iter()
            .find(|r| r.signature() == signature)
        {
            info!(
                registration_id = %existing.registration_id(),
                "Capture already queued, not sending again"
            );
            return Ok(SubmissionOutcome::AlreadyQueued {
                existing: existing.registration_id().clone(),
            });
        }

        let registration_id = self.queue.ids().next(draft.submitter()).await?;
        let record = PendingRecord::new(draft, new_temp_id(), registration_id.clone(), Utc::now());

        match self.remote.register_asset(&record).await {
            Ok(success) => {
                info!(%registration_id, "Capture delivered directly");
                Ok(SubmissionOutcome::Delivered {
                    registration_id,
                    payload: success.payload,
                })
            }
            Err(failure) if failure.is_validation() => {
                warn!(%registration_id, error = %failure, "Capture rejected by service");
                Ok(SubmissionOutcome::Rejected {
                    registration_id,
                    failure,
                })
            }
            Err(failure) => {
                warn!(
                    %registration_id,
                    kind = failure.kind(),
                    error = %failure,
                    "Direct send failed, queueing capture"
                );
                let draft = record.record().clone();
                Ok(self.queue.enqueue_with_id(draft, registration_id).await?.into())
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{draft, queue_with, FixedProber, ScriptedRemote};
    use std::sync::atomic::Ordering;

    fn service(
        queue: PendingQueue,
        remote: Arc<ScriptedRemote>,
        prober: Arc<FixedProber>,
    ) -> SubmissionService {
        SubmissionService::new(queue, remote, prober)
    }

    #[tokio::test]
    async fn test_online_delivers_directly() {
        let (_, queue) = queue_with(&[]).await;
        let remote = Arc::new(ScriptedRemote::default());
        let svc = service(queue.clone(), remote.clone(), FixedProber::new(true));

        let outcome = svc.submit(draft("SN-1")).await.unwrap();

        match &outcome {
            SubmissionOutcome::Delivered { registration_id, .. } => {
                assert_eq!(registration_id.as_str(), "T01-U02-0001");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(outcome.is_saved());
        assert_eq!(remote.calls(), vec!["SN-1"]);
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_offline_queues_without_calling() {
        let (_, queue) = queue_with(&[]).await;
        let remote = Arc::new(ScriptedRemote::default());
        let svc = service(queue.clone(), remote.clone(), FixedProber::new(false));

        let outcome = svc.submit(draft("SN-1")).await.unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Queued(_)));
        assert!(outcome.message().starts_with("Saved offline as T01-U02-0001"));
        assert!(remote.calls().is_empty());
        assert_eq!(queue.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_queues_with_same_id() {
        let (_, queue) = queue_with(&[]).await;
        let remote = ScriptedRemote::failing(&[(
            "SN-1",
            RemoteFailure::NetworkUnreachable("connection reset".into()),
        )]);
        let svc = service(queue.clone(), remote, FixedProber::new(true));

        let outcome = svc.submit(draft("SN-1")).await.unwrap();

        let SubmissionOutcome::Queued(record) = outcome else {
            panic!("expected queued outcome");
        };
        assert_eq!(record.registration_id().as_str(), "T01-U02-0001");
        // The id was not allocated a second time.
        assert_eq!(queue.ids().last_issued("T01-U02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_queued() {
        let (_, queue) = queue_with(&[]).await;
        let remote = ScriptedRemote::failing(&[(
            "SN-1",
            RemoteFailure::ValidationError {
                message: Some("invalid".into()),
                field_errors: Default::default(),
            },
        )]);
        let svc = service(queue.clone(), remote, FixedProber::new(true));

        let outcome = svc.submit(draft("SN-1")).await.unwrap();

        assert!(matches!(outcome, SubmissionOutcome::Rejected { .. }));
        assert!(!outcome.is_saved());
        assert!(outcome.message().contains("Correct the capture"));
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_of_queued_capture_is_not_sent() {
        let (_, queue) = queue_with(&["SN-1"]).await;
        let remote = Arc::new(ScriptedRemote::default());
        let prober = FixedProber::new(false);
        let svc = service(queue.clone(), remote.clone(), prober.clone());

        // Offline: the queue rejects it.
        let offline = svc.submit(draft("SN-1")).await.unwrap();
        assert_eq!(
            offline,
            SubmissionOutcome::AlreadyQueued {
                existing: RegistrationId::from_issued("T01-U02-0001")
            }
        );

        // Online: the service refuses to send it twice.
        prober.reachable.store(true, Ordering::SeqCst);
        let online = svc.submit(draft("SN-1")).await.unwrap();
        assert!(matches!(online, SubmissionOutcome::AlreadyQueued { .. }));
        assert!(remote.calls().is_empty());
        assert_eq!(queue.ids().last_issued("T01-U02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let (store, queue) = queue_with(&[]).await;
        store.set_fail_writes(true);
        let svc = service(queue, Arc::new(ScriptedRemote::default()), FixedProber::new(false));

        let err = svc.submit(draft("SN-1")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}

//! # Sync Engine
//!
//! Drains the pending queue into the inventory service, one record at a time.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │        trigger (manual / reconnect / periodic)                          │
//! │             │                                                           │
//! │             ▼                                                           │
//! │   ┌──────────────────┐  pass already running   ┌────────────────────┐  │
//! │   │      Idle        │ ──────────────────────► │ Skipped (coalesced)│  │
//! │   └────────┬─────────┘                         └────────────────────┘  │
//! │            │                                                            │
//! │            ▼                                                            │
//! │   ┌──────────────────┐  probe false            ┌────────────────────┐  │
//! │   │    Draining      │ ──────────────────────► │ offline report     │  │
//! │   │                  │                         │ (no calls, no I/O) │  │
//! │   │  snapshot = list │                         └────────────────────┘  │
//! │   │  for each record │                                                  │
//! │   │    Sending ──► Delivered  (collect temp id)                         │
//! │   │            └─► Failed     (collect error, keep going)               │
//! │   │    pace                                                             │
//! │   │  remove_many(delivered)  ← once                                     │
//! │   └────────┬─────────┘                                                  │
//! │            ▼                                                            │
//! │          Idle + SyncReport                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//! - At most one pass runs at a time; overlapping triggers are dropped.
//! - A pass only works on the snapshot taken at its start, so it always ends.
//! - A record leaves the queue only after the service confirmed it. A crash
//!   between the confirmation and the removal means it is sent again on the
//!   next pass (at-least-once).
//! - A record the service rejected as invalid is held: automatic passes skip
//!   it and only a manual pass sends it again.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use inventory_core::RegistrationId;
use inventory_db::PendingQueue;

use crate::agent::{NoOpEmitter, SyncEventEmitter};
use crate::connectivity::ReachabilityProbe;
use crate::error::SyncResult;
use crate::remote::{InventoryRemote, RemoteFailure};

// =============================================================================
// Pass Types
// =============================================================================

/// What started a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The user asked for it.
    Manual,
    /// The device went from offline to online.
    Reconnect,
    /// The periodic timer fired while online.
    Periodic,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTrigger::Manual => write!(f, "manual"),
            SyncTrigger::Reconnect => write!(f, "reconnect"),
            SyncTrigger::Periodic => write!(f, "periodic"),
        }
    }
}

/// Whether a pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Draining,
}

/// A record that could not be delivered in this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    pub temp_id: String,
    pub registration_id: RegistrationId,
    pub failure: RemoteFailure,
}

/// Aggregate result of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The probe said the service is unreachable; nothing was attempted.
    pub offline: bool,
    pub synced: usize,
    pub failed: usize,
    /// Previously rejected records this automatic pass did not send.
    pub held: usize,
    pub errors: Vec<RecordError>,
}

impl SyncReport {
    fn offline() -> Self {
        SyncReport {
            offline: true,
            ..Default::default()
        }
    }

    /// Both deliveries and failures in the same pass.
    pub fn is_partial(&self) -> bool {
        self.synced > 0 && self.failed > 0
    }

    /// Records the service rejected; they need editing, not another pass.
    pub fn validation_failures(&self) -> impl Iterator<Item = &RecordError> {
        self.errors.iter().filter(|e| e.failure.is_validation())
    }

    /// One-line message for the person holding the device.
    pub fn summary(&self) -> String {
        if self.offline {
            return "Inventory service unreachable; nothing was sent. Records stay queued.".into();
        }
        if self.synced == 0 && self.failed == 0 {
            if self.held > 0 {
                return format!("{} rejected record(s) held until a manual sync.", self.held);
            }
            return "Nothing to sync.".into();
        }

        let mut msg = match (self.synced, self.failed) {
            (s, 0) => format!("Synced {} record(s).", s),
            (0, f) => format!("{} record(s) failed to sync and stay queued.", f),
            (s, f) => format!("Synced {} record(s); {} failed and stay queued.", s, f),
        };

        let rejected = self.validation_failures().count();
        if rejected > 0 {
            msg.push_str(&format!(
                " {} were rejected by the service and will not succeed until corrected.",
                rejected
            ));
        }
        if self.held > 0 {
            msg.push_str(&format!(
                " {} rejected record(s) held until a manual sync.",
                self.held
            ));
        }
        msg
    }
}

/// Outcome of asking the engine for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(SyncReport),
    /// Another pass was already draining; this trigger was dropped.
    Skipped,
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Runs sync passes. Clones share the same pass lock and held set.
#[derive(Clone)]
pub struct SyncEngine {
    queue: PendingQueue,
    remote: Arc<dyn InventoryRemote>,
    prober: Arc<dyn ReachabilityProbe>,
    emitter: Arc<dyn SyncEventEmitter>,
    pacing: Duration,
    pass_lock: Arc<Mutex<()>>,
    draining: Arc<AtomicBool>,
    /// Temp ids whose last attempt was a validation rejection.
    held: Arc<Mutex<HashSet<String>>>,
}

/// Clears the draining flag however the pass ends.
struct DrainingGuard<'a>(&'a AtomicBool);

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        queue: PendingQueue,
        remote: Arc<dyn InventoryRemote>,
        prober: Arc<dyn ReachabilityProbe>,
        pacing: Duration,
    ) -> Self {
        SyncEngine {
            queue,
            remote,
            prober,
            emitter: Arc::new(NoOpEmitter),
            pacing,
            pass_lock: Arc::new(Mutex::new(())),
            draining: Arc::new(AtomicBool::new(false)),
            held: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Sets the event emitter for progress notifications.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn state(&self) -> EngineState {
        if self.draining.load(Ordering::SeqCst) {
            EngineState::Draining
        } else {
            EngineState::Idle
        }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn prober(&self) -> &Arc<dyn ReachabilityProbe> {
        &self.prober
    }

    /// Runs one pass unless one is already running.
    ///
    /// Per-record failures end up in the report. Only a storage failure
    /// (queue unreadable, or delivered records could not be removed) is
    /// returned as an error.
    pub async fn run_pass(&self, trigger: SyncTrigger) -> SyncResult<PassOutcome> {
        let Ok(_pass) = self.pass_lock.try_lock() else {
            info!(%trigger, "Sync pass already running, trigger coalesced");
            return Ok(PassOutcome::Skipped);
        };
        self.draining.store(true, Ordering::SeqCst);
        let _draining = DrainingGuard(&self.draining);

        info!(%trigger, "Starting sync pass");

        if !self.prober.probe_reachable().await {
            info!(%trigger, "Service unreachable, sync pass aborted");
            return Ok(PassOutcome::Completed(SyncReport::offline()));
        }

        let snapshot = self.queue.list().await.map_err(|e| {
            error!(error = %e, "Could not read pending queue");
            e
        })?;

        let mut held = self.held.lock().await;

        if snapshot.is_empty() {
            debug!("Pending queue is empty");
            held.clear();
            return Ok(PassOutcome::Completed(SyncReport::default()));
        }

        // Forget records that left the queue some other way (purge, repair).
        let queued: HashSet<&str> = snapshot.iter().map(|r| r.temp_id()).collect();
        held.retain(|temp_id| queued.contains(temp_id.as_str()));

        let send_held = trigger == SyncTrigger::Manual;
        let total = snapshot.len();
        self.emitter.emit_progress(0, total);

        let mut processed: HashSet<&str> = HashSet::with_capacity(total);
        let mut delivered: HashSet<String> = HashSet::new();
        let mut errors: Vec<RecordError> = Vec::new();
        let mut skipped_held = 0;
        let mut sent_any = false;

        for (index, record) in snapshot.iter().enumerate() {
            if !processed.insert(record.temp_id()) {
                warn!(temp_id = %record.temp_id(), "Record appears twice in snapshot, skipping");
                continue;
            }

            if !send_held && held.contains(record.temp_id()) {
                debug!(
                    temp_id = %record.temp_id(),
                    "Rejected record held until a manual sync"
                );
                skipped_held += 1;
                self.emitter.emit_progress(index + 1, total);
                continue;
            }

            if sent_any && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            sent_any = true;

            match self.remote.register_asset(record).await {
                Ok(_) => {
                    debug!(
                        temp_id = %record.temp_id(),
                        registration_id = %record.registration_id(),
                        "Record delivered"
                    );
                    held.remove(record.temp_id());
                    delivered.insert(record.temp_id().to_string());
                }
                Err(failure) => {
                    warn!(
                        temp_id = %record.temp_id(),
                        registration_id = %record.registration_id(),
                        kind = failure.kind(),
                        error = %failure,
                        "Record not delivered"
                    );
                    if failure.is_validation() {
                        held.insert(record.temp_id().to_string());
                    } else {
                        held.remove(record.temp_id());
                    }
                    errors.push(RecordError {
                        temp_id: record.temp_id().to_string(),
                        registration_id: record.registration_id().clone(),
                        failure,
                    });
                }
            }

            self.emitter.emit_progress(index + 1, total);
        }

        if !delivered.is_empty() {
            if let Err(e) = self.queue.remove_many(&delivered).await {
                error!(
                    delivered = delivered.len(),
                    error = %e,
                    "Delivered records could not be removed and will be sent again"
                );
                return Err(e.into());
            }
        }

        let report = SyncReport {
            offline: false,
            synced: delivered.len(),
            failed: errors.len(),
            held: skipped_held,
            errors,
        };

        info!(
            %trigger,
            synced = report.synced,
            failed = report.failed,
            held = report.held,
            "Sync pass finished"
        );

        Ok(PassOutcome::Completed(report))
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("pacing", &self.pacing)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Sync Agent
//!
//! Long-running task that decides WHEN the sync engine runs.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  TRIGGERS                                   ┌────────────────────────┐ │
//! │  ────────                                   │      SyncEngine        │ │
//! │  sync_now()  (handle) ───────────────────►  │                        │ │
//! │  offline → online edge ──────────────────►  │  run_pass(trigger)     │ │
//! │  periodic tick (only while online) ──────►  │  (coalesces overlaps)  │ │
//! │                                             └───────────┬────────────┘ │
//! │  NETWORK POLL                                           │              │
//! │  ────────────                                           ▼              │
//! │  every network_poll_secs: probe ──► NetworkMonitor   SyncReport       │
//! │                                                         │              │
//! │  STATUS EVENTS (to the emitter):                        ▼              │
//! │  ───────────────────────────────              SyncStatus + emitter    │
//! │  emit_status   - after every pass and poll                            │
//! │  emit_progress - (current, total) per record                          │
//! │  emit_report   - finished pass                                        │
//! │  emit_error    - storage failures                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every pass runs on its own task so triggers keep flowing while the queue
//! drains. Triggers that land during a pass are dropped by the engine.

use chrono::{DateTime, Utc};
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SyncSettings;
use crate::connectivity::{NetworkMonitor, OnlineEdge};
use crate::engine::{EngineState, PassOutcome, SyncEngine, SyncReport, SyncTrigger};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Sync Status
// =============================================================================

/// Snapshot for the UI.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Last-known connectivity (advisory).
    pub online: bool,

    /// Whether a pass is running.
    pub state: EngineState,

    /// Number of records waiting in the queue.
    pub pending_count: usize,

    /// When the last pass that reached the service finished.
    pub last_sync: Option<DateTime<Utc>>,

    /// Summary line of the last finished pass.
    pub last_report: Option<String>,

    /// Last error message (if any).
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus {
            online: false,
            state: EngineState::Idle,
            pending_count: 0,
            last_sync: None,
            last_report: None,
            last_error: None,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync notifications (UI bindings, logs, tests).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits per-record progress of a running pass.
    fn emit_progress(&self, current: usize, total: usize);

    /// Emits the report of a finished pass.
    fn emit_report(&self, report: &SyncReport);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _current: usize, _total: usize) {}
    fn emit_report(&self, _report: &SyncReport) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Agent
// =============================================================================

enum AgentCommand {
    SyncNow(oneshot::Sender<SyncResult<PassOutcome>>),
    Shutdown,
}

/// Owns the triggers. Build it, then [`SyncAgent::spawn`] it.
pub struct SyncAgent {
    engine: SyncEngine,
    monitor: NetworkMonitor,
    settings: SyncSettings,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncAgent {
    pub fn new(engine: SyncEngine, monitor: NetworkMonitor, settings: SyncSettings) -> Self {
        Self::with_emitter(engine, monitor, settings, Arc::new(NoOpEmitter))
    }

    /// Creates an agent with a custom event emitter.
    ///
    /// The engine reports its progress to the same emitter.
    pub fn with_emitter(
        engine: SyncEngine,
        monitor: NetworkMonitor,
        settings: SyncSettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let status = SyncStatus {
            online: monitor.last_known(),
            ..Default::default()
        };

        SyncAgent {
            engine: engine.with_emitter(emitter.clone()),
            monitor,
            settings,
            status: Arc::new(RwLock::new(status)),
            emitter,
        }
    }

    /// Starts the trigger loop on a background task.
    pub fn spawn(self) -> (SyncAgentHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(16);

        let handle = SyncAgentHandle {
            commands: commands_tx,
            status: self.status.clone(),
            engine: self.engine.clone(),
            monitor: self.monitor.clone(),
        };

        info!(
            periodic_secs = self.settings.periodic_interval_secs,
            sync_on_reconnect = self.settings.sync_on_reconnect,
            "Starting sync agent"
        );

        // Subscribe before returning so no transition is missed.
        let edges = self.monitor.online_edges();
        let task = tokio::spawn(self.run(commands_rx, edges));
        (handle, task)
    }

    async fn run(self, mut commands: mpsc::Receiver<AgentCommand>, mut edges: OnlineEdge) {
        let mut periodic = self.settings.periodic_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        let mut poll = interval(self.settings.network_poll());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut passes = JoinSet::new();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(AgentCommand::SyncNow(reply)) => {
                        passes.spawn(self.drive_pass(SyncTrigger::Manual, Some(reply)));
                    }
                    Some(AgentCommand::Shutdown) | None => {
                        info!("Sync agent received shutdown");
                        break;
                    }
                },

                Some(()) = edges.next_online(), if self.settings.sync_on_reconnect => {
                    info!("Device back online, starting sync");
                    passes.spawn(self.drive_pass(SyncTrigger::Reconnect, None));
                }

                _ = next_tick(&mut periodic) => {
                    if self.monitor.last_known() {
                        passes.spawn(self.drive_pass(SyncTrigger::Periodic, None));
                    } else {
                        debug!("Periodic sync skipped while offline");
                    }
                }

                _ = poll.tick() => {
                    let online = self.engine.prober().probe_reachable().await;
                    self.monitor.set_online(online);
                    refresh_status(&self.engine, &self.monitor, &self.status, &self.emitter).await;
                }

                Some(_) = passes.join_next(), if !passes.is_empty() => {}
            }
        }

        // Let a running pass finish its removal step.
        while passes.join_next().await.is_some() {}

        info!("Sync agent stopped");
    }

    fn drive_pass(
        &self,
        trigger: SyncTrigger,
        reply: Option<oneshot::Sender<SyncResult<PassOutcome>>>,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let engine = self.engine.clone();
        let monitor = self.monitor.clone();
        let status = self.status.clone();
        let emitter = self.emitter.clone();

        async move {
            let result = engine.run_pass(trigger).await;

            match &result {
                Ok(PassOutcome::Completed(report)) => {
                    if report.offline {
                        monitor.set_online(false);
                    }
                    {
                        let mut s = status.write().await;
                        if !report.offline {
                            s.last_sync = Some(Utc::now());
                        }
                        s.last_report = Some(report.summary());
                        s.last_error = None;
                    }
                    emitter.emit_report(report);
                }
                Ok(PassOutcome::Skipped) => {}
                Err(e) => {
                    error!(%trigger, error = %e, "Sync pass failed");
                    status.write().await.last_error = Some(e.to_string());
                    emitter.emit_error(&e.to_string(), e.is_retryable());
                }
            }

            refresh_status(&engine, &monitor, &status, &emitter).await;

            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn refresh_status(
    engine: &SyncEngine,
    monitor: &NetworkMonitor,
    status: &RwLock<SyncStatus>,
    emitter: &Arc<dyn SyncEventEmitter>,
) {
    let pending_count = engine.queue().count().await;

    let snapshot = {
        let mut s = status.write().await;
        s.online = monitor.last_known();
        s.state = engine.state();
        match pending_count {
            Ok(count) => s.pending_count = count,
            Err(e) => {
                warn!(error = %e, "Could not count pending records");
                s.last_error = Some(e.to_string());
            }
        }
        s.clone()
    };

    emitter.emit_status(&snapshot);
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running [`SyncAgent`].
#[derive(Clone)]
pub struct SyncAgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    status: Arc<RwLock<SyncStatus>>,
    engine: SyncEngine,
    monitor: NetworkMonitor,
}

impl SyncAgentHandle {
    /// Asks for a pass now and waits for its outcome.
    ///
    /// Returns [`PassOutcome::Skipped`] if another pass was already running.
    pub async fn sync_now(&self) -> SyncResult<PassOutcome> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(AgentCommand::SyncNow(tx))
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        rx.await.map_err(|e| SyncError::ChannelError(e.to_string()))?
    }

    /// Gets the current sync status.
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        status.online = self.monitor.last_known();
        status.state = self.engine.state();
        status
    }

    /// The network signal the agent feeds and listens to.
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Signals the agent to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(AgentCommand::Shutdown).await;
    }
}

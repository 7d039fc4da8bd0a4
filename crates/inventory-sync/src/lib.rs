//! # inventory-sync: Delivery Engine for Asset Capture
//!
//! Decides when captures leave the device and sends them to the inventory
//! service, one record per call.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Capture Sync Architecture                        │
//! │                                                                         │
//! │   user presses "save"                    reconnect / periodic / manual  │
//! │          │                                           │                  │
//! │          ▼                                           ▼                  │
//! │  ┌──────────────────┐                      ┌──────────────────┐         │
//! │  │SubmissionService │                      │    SyncAgent     │         │
//! │  │ send now or      │                      │ trigger loop +   │         │
//! │  │ enqueue          │                      │ network poll     │         │
//! │  └───┬─────────┬────┘                      └────────┬─────────┘         │
//! │      │         │                                    ▼                   │
//! │      │         │                           ┌──────────────────┐         │
//! │      │         │                           │    SyncEngine    │         │
//! │      │         │                           │ paced drain pass │         │
//! │      │         │                           └──┬────────────┬──┘         │
//! │      │         ▼                              │            │            │
//! │      │   ┌──────────────────────────────────────┐          │            │
//! │      │   │ PendingQueue + IdAllocator (inv-db)  │◄─────────┘            │
//! │      │   └──────────────────────────────────────┘                       │
//! │      ▼                                        ▼                         │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │ ReachabilityProbe (HEAD)        InventoryRemote (POST create)  │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` trigger loop, status and event emitter
//! - [`config`] - Device, remote, pacing and storage settings
//! - [`connectivity`] - Reachability probe and network monitor
//! - [`engine`] - The drain pass
//! - [`error`] - Sync error types
//! - [`remote`] - Create call and failure classification
//! - [`submission`] - Direct send with queue fallback
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use inventory_sync::{HttpInventoryClient, HttpProber, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::load_or_default(None);
//! let remote = Arc::new(HttpInventoryClient::new(&config.remote)?);
//! let prober = Arc::new(HttpProber::new(&config.remote)?);
//!
//! let engine = SyncEngine::new(queue, remote, prober, config.sync.pacing());
//! if let PassOutcome::Completed(report) = engine.run_pass(SyncTrigger::Manual).await? {
//!     println!("{}", report.summary());
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod remote;
pub mod submission;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{NoOpEmitter, SyncAgent, SyncAgentHandle, SyncEventEmitter, SyncStatus};
pub use config::{DeviceConfig, RemoteSettings, StorageSettings, SyncConfig, SyncSettings};
pub use connectivity::{HttpProber, NetworkMonitor, NetworkSubscription, OnlineEdge, ReachabilityProbe};
pub use engine::{EngineState, PassOutcome, RecordError, SyncEngine, SyncReport, SyncTrigger};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpInventoryClient, InventoryRemote, RemoteFailure, RemoteSuccess};
pub use submission::{SubmissionOutcome, SubmissionService};

//! # inventory-db: Durable Storage for Asset Capture
//!
//! Everything the capture device persists: the pending queue and the
//! per-submitter registration counters.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Capture Data Flow                                │
//! │                                                                         │
//! │  SubmissionService / SyncEngine (inventory-sync)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   inventory-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Repositories │    │  KeyValueStore│    │   Database   │  │   │
//! │  │   │               │    │               │    │   (pool.rs)  │  │   │
//! │  │   │ PendingQueue  │───►│ SqliteKvStore │───►│ SqlitePool   │  │   │
//! │  │   │ IdAllocator   │    │ MemoryKvStore │    │ + migrations │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  capture.db  (kv_store table)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and lifecycle
//! - [`migrations`] - Embedded database migrations
//! - [`kv`] - Key/value backends
//! - [`repository`] - Pending queue and id allocator
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use inventory_db::{Database, DbConfig, PendingQueue};
//!
//! let db = Database::new(DbConfig::new("capture.db")).await?;
//! let queue = PendingQueue::new(Arc::new(db.kv_store()));
//!
//! queue.repair_duplicates().await?;
//! let outcome = queue.enqueue(draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod kv;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use kv::{KeyValueStore, MemoryKvStore, SqliteKvStore};
pub use pool::{Database, DbConfig};

pub use repository::counters::IdAllocator;
pub use repository::queue::{EnqueueOutcome, PendingQueue};

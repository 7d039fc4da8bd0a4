//! # inventory-core: Pure Domain Model for Asset Capture
//!
//! Types and derivations shared by the queue, the sync engine and the CLI.
//! Nothing in here touches storage or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Inventory Capture Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  capture form / inventory-capture CLI           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ RecordDraft                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ inventory-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌─────────────┐  ┌──────────────┐             │   │
//! │  │   │   types   │  │  signature  │  │ registration │             │   │
//! │  │   │  Record   │  │   Dedup     │  │  id format   │             │   │
//! │  │   │  Assignee │  │   key       │  │  + fallback  │             │   │
//! │  │   └───────────┘  └─────────────┘  └──────────────┘             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   inventory-db (queue + counters)  ──►  inventory-sync (drain)  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `RecordDraft`, `PendingRecord`, `Assignee`, `AssetStatus`
//! - [`signature`] - Case-insensitive duplicate key
//! - [`registration`] - Registration id format and fallback ids
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use inventory_core::{Assignee, RegistrationId};
//!
//! let assignee = Assignee::resolve(Some("4521"), None).unwrap();
//! assert_eq!(assignee.signature_component(), "employee:4521");
//!
//! let id = RegistrationId::allocated("T01-U02", 3);
//! assert_eq!(id.as_str(), "T01-U02-0003");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod registration;
pub mod signature;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use registration::RegistrationId;
pub use signature::DedupSignature;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Assigned area sent when the capture leaves it blank.
pub const UNASSIGNED_AREA: &str = "Sin asignar";

//! # Repository Module
//!
//! The two persisted collections of the capture device.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PendingQueue                          IdAllocator                      │
//! │  ├── enqueue / enqueue_with_id ──────► next(submitter)                  │
//! │  ├── list                              ├── last_issued                  │
//! │  ├── remove_many                       ├── snapshot                     │
//! │  ├── repair_duplicates                 └── reset                        │
//! │  ├── purge_all                                                          │
//! │  └── count                                                              │
//! │       │                                      │                          │
//! │       ▼                                      ▼                          │
//! │  "pending_records" (JSON array)        "user_counters" (JSON object)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both are written against [`KeyValueStore`](crate::kv::KeyValueStore), so
//! tests can swap in the in-memory backend.

pub mod counters;
pub mod queue;

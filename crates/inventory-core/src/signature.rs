//! # Dedup Signature
//!
//! The key used to reject a capture that is already waiting in the queue.
//!
//! ```text
//!   asset_type | model | serial | inventory | delivery_date | assignee
//!   ─────────────────────────── lowercased ─────────────────────────────
//!   "laptop|thinkpad t14|sn-001|inv-1000|2024-03-01|employee:4521"
//! ```
//!
//! Empty fields keep their slot, so `("a", "", "b")` and `("a", "b", "")`
//! produce different signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::RecordDraft;

const SEPARATOR: &str = "|";

/// Case-insensitive identity of a capture for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupSignature(String);

impl DedupSignature {
    /// Derives the signature of a capture.
    pub fn of(record: &RecordDraft) -> Self {
        let delivery = record.delivery_date.format("%Y-%m-%d").to_string();
        let assignee = record.assignee.signature_component();

        let parts: [&str; 6] = [
            &record.asset_type,
            &record.model,
            &record.serial_number,
            &record.inventory_number,
            &delivery,
            &assignee,
        ];

        DedupSignature(parts.join(SEPARATOR).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

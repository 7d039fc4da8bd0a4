//! # Registration Ids
//!
//! Human-readable identifiers the inventory service shows for each asset.
//!
//! ## Format
//! ```text
//!   allocated:  "{submitter}-{counter:04}"         e.g. T01-U02-0007
//!   fallback:   "NO-SUBMITTER-{last 8 ms digits}"  e.g. NO-SUBMITTER-39517201
//! ```
//!
//! The counter itself lives in `inventory-db` (it needs storage). This module
//! only formats and inspects ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Prefix of ids synthesized when no submitter is known.
///
/// Allocated ids end in a counter segment; ids with this prefix have no
/// counter behind them and are never parsed back into one.
pub const FALLBACK_PREFIX: &str = "NO-SUBMITTER-";

/// Value sent on the wire if a record somehow carries an empty id.
pub const MISSING_REGISTRATION_ID: &str = "SIN-ID";

/// Externally visible id, assigned once per record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Formats a counter allocation for a submitter.
    pub fn allocated(submitter_id: &str, counter: u64) -> Self {
        RegistrationId(format!("{}-{:04}", submitter_id, counter))
    }

    /// Synthesizes an id for a capture with no known submitter.
    pub fn fallback(now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis().rem_euclid(100_000_000);
        RegistrationId(format!("{}{:08}", FALLBACK_PREFIX, millis))
    }

    /// Wraps an id that was already issued (e.g. read back from storage).
    pub fn from_issued(id: impl Into<String>) -> Self {
        RegistrationId(id.into())
    }

    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX)
    }

    /// Splits an allocated id into submitter and counter.
    ///
    /// Returns `None` for fallback ids and anything not ending in `-NNNN`.
    pub fn parts(&self) -> Option<(&str, u64)> {
        if self.is_fallback() {
            return None;
        }
        let (submitter, counter) = self.0.rsplit_once('-')?;
        if submitter.is_empty() || counter.len() < 4 || !counter.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        counter.parse().ok().map(|n| (submitter, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as sent to the service, with the sentinel for a blank value.
    pub fn wire_value(&self) -> &str {
        if self.0.trim().is_empty() {
            MISSING_REGISTRATION_ID
        } else {
            &self.0
        }
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_allocated_is_zero_padded() {
        assert_eq!(RegistrationId::allocated("T01-U02", 1).as_str(), "T01-U02-0001");
        assert_eq!(RegistrationId::allocated("T01-U02", 42).as_str(), "T01-U02-0042");
        // Padding is a minimum, not a cap.
        assert_eq!(RegistrationId::allocated("T01-U02", 12345).as_str(), "T01-U02-12345");
    }

    #[test]
    fn test_parts() {
        let id = RegistrationId::allocated("T01-U02", 7);
        assert_eq!(id.parts(), Some(("T01-U02", 7)));
        assert_eq!(RegistrationId::from_issued("garbage").parts(), None);
    }

    #[test]
    fn test_fallback_is_distinguishable() {
        let now = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let id = RegistrationId::fallback(now);
        assert_eq!(id.as_str(), "NO-SUBMITTER-00123456");
        assert!(id.is_fallback());
        assert_eq!(id.parts(), None);
        assert!(!RegistrationId::allocated("T01-U02", 1).is_fallback());
    }

    #[test]
    fn test_wire_value_sentinel() {
        assert_eq!(RegistrationId::from_issued("").wire_value(), MISSING_REGISTRATION_ID);
        assert_eq!(RegistrationId::allocated("A", 1).wire_value(), "A-0001");
    }
}

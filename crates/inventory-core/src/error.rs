//! # Error Types
//!
//! Domain-specific error types for inventory-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  inventory-core errors (this file)                                     │
//! │  └── CoreError        - Capture input that cannot form a record        │
//! │                                                                         │
//! │  inventory-db errors (separate crate)                                  │
//! │  └── DbError          - Persisted queue/counter failures               │
//! │                                                                         │
//! │  inventory-sync errors (separate crate)                                │
//! │  ├── RemoteFailure    - Per-record outcome of a create call            │
//! │  └── SyncError        - Pass-level and configuration failures          │
//! │                                                                         │
//! │  Flow: CoreError → (CLI) ; DbError → SyncError → (CLI)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors raised while turning captured input into domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Neither an employee id nor an ad-hoc name was provided.
    ///
    /// ## When This Occurs
    /// - The form was submitted without choosing an assignee
    /// - Both values were blank after trimming
    #[error("An assignee is required: choose an existing employee or enter a name")]
    MissingAssignee,

    /// A status value outside the accepted set.
    #[error("Unknown asset status '{0}': expected 'activo' or 'baja'")]
    UnknownStatus(String),

    /// A field that must carry a value was blank.
    #[error("{field} is required")]
    Required { field: String },
}

impl CoreError {
    /// Creates a Required error for the given field.
    pub fn required(field: impl Into<String>) -> Self {
        CoreError::Required {
            field: field.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CoreError::UnknownStatus("roto".into()).to_string(),
            "Unknown asset status 'roto': expected 'activo' or 'baja'"
        );
        assert_eq!(CoreError::required("serial_number").to_string(), "serial_number is required");
    }
}

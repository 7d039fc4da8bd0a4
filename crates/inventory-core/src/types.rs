//! # Domain Types
//!
//! Core domain types used throughout the capture workspace.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌──────────────────────────────────┐       │
//! │  │  RecordDraft    │        │         PendingRecord            │       │
//! │  │  ─────────────  │ enqueue│  ──────────────────────────────  │       │
//! │  │  asset fields   │ ─────► │  temp_id          (local only)   │       │
//! │  │  assignee       │        │  registration_id  (assigned once)│       │
//! │  │  submitter meta │        │  created_at                      │       │
//! │  └─────────────────┘        │  record: RecordDraft (frozen)    │       │
//! │                             └──────────────────────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────────────────┐   ┌─────────────────┐                 │
//! │  │        Assignee             │   │  AssetStatus    │                 │
//! │  │  ─────────────────────────  │   │  ─────────────  │                 │
//! │  │  ExistingEmployee { id }    │   │  Active         │                 │
//! │  │  AdHocEmployee { name }     │   │  Decommissioned │                 │
//! │  └─────────────────────────────┘   └─────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Immutability
//! A `PendingRecord` exposes read accessors only. Once queued, the only
//! things that can happen to it are removal after delivery or deletion by
//! duplicate repair.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::registration::RegistrationId;
use crate::signature::DedupSignature;
use crate::UNASSIGNED_AREA;

// =============================================================================
// Assignee
// =============================================================================

/// The person an asset is assigned to.
///
/// Resolved once at capture time so the network boundary never has to guess
/// which of the two form inputs applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignee {
    /// An employee picked from the reference lookup.
    ExistingEmployee { employee_id: String },
    /// A person typed in by hand because they are not in the lookup yet.
    AdHocEmployee { name: String },
}

impl Assignee {
    /// Resolves the two form inputs into a single assignee.
    ///
    /// An ad-hoc name wins over a selected employee id when both are present.
    pub fn resolve(employee_id: Option<&str>, ad_hoc_name: Option<&str>) -> CoreResult<Self> {
        fn non_blank(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(name) = non_blank(ad_hoc_name) {
            return Ok(Assignee::AdHocEmployee {
                name: name.to_string(),
            });
        }

        match non_blank(employee_id) {
            Some(id) => Ok(Assignee::ExistingEmployee {
                employee_id: id.to_string(),
            }),
            None => Err(CoreError::MissingAssignee),
        }
    }

    /// Component used in the dedup signature.
    ///
    /// The variant is part of the key so that an employee id and an ad-hoc
    /// name that happen to be spelled alike never collide.
    pub fn signature_component(&self) -> String {
        match self {
            Assignee::ExistingEmployee { employee_id } => format!("employee:{}", employee_id),
            Assignee::AdHocEmployee { name } => format!("name:{}", name),
        }
    }
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignee::ExistingEmployee { employee_id } => write!(f, "employee #{}", employee_id),
            Assignee::AdHocEmployee { name } => write!(f, "{} (new)", name),
        }
    }
}

// =============================================================================
// Asset Status
// =============================================================================

/// Lifecycle status of the captured asset.
///
/// Serialized with the values the inventory service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AssetStatus {
    /// In service.
    #[serde(rename = "activo")]
    Active,
    /// Written off.
    #[serde(rename = "baja")]
    Decommissioned,
}

impl AssetStatus {
    /// Wire value expected by the inventory service.
    pub fn as_wire(&self) -> &'static str {
        match self {
            AssetStatus::Active => "activo",
            AssetStatus::Decommissioned => "baja",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for AssetStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "activo" | "active" => Ok(AssetStatus::Active),
            "baja" | "decommissioned" => Ok(AssetStatus::Decommissioned),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Record Draft
// =============================================================================

/// A finished capture, as handed over by the form.
///
/// This is what the submission flow and the queue accept. It carries no
/// queue-local or server-visible identifiers yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordDraft {
    /// Kind of equipment (laptop, printer, ...).
    pub asset_type: String,
    pub model: String,
    pub serial_number: String,
    pub inventory_number: String,

    /// Date the asset was handed to the assignee.
    #[ts(as = "String")]
    pub delivery_date: NaiveDate,

    pub assignee: Assignee,
    pub location: String,

    /// Area the asset is assigned to. `None` is sent as "Sin asignar".
    pub assigned_area: Option<String>,

    pub status: AssetStatus,

    /// Date the record was captured on the device.
    #[ts(as = "String")]
    pub capture_date: NaiveDate,

    /// Logged-in user submitting the record (e.g. "T01-U02").
    pub submitter_id: Option<String>,

    /// Display name of the submitter.
    pub submitter_name: Option<String>,

    /// Territorial unit the submitter belongs to.
    pub territorial: Option<String>,
}

impl RecordDraft {
    /// The dedup signature of this capture.
    pub fn signature(&self) -> DedupSignature {
        DedupSignature::of(self)
    }

    /// Assigned area with the "unassigned" default applied.
    pub fn assigned_area_or_default(&self) -> &str {
        self.assigned_area
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNASSIGNED_AREA)
    }

    /// Submitter id if one is present and non-blank.
    pub fn submitter(&self) -> Option<&str> {
        self.submitter_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Pending Record
// =============================================================================

/// A capture waiting in the local queue for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PendingRecord {
    temp_id: String,
    registration_id: RegistrationId,
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
    record: RecordDraft,
}

impl PendingRecord {
    /// Freezes a draft into a pending record.
    pub fn new(
        record: RecordDraft,
        temp_id: String,
        registration_id: RegistrationId,
        created_at: DateTime<Utc>,
    ) -> Self {
        PendingRecord {
            temp_id,
            registration_id,
            created_at,
            record,
        }
    }

    /// Queue-local identifier. Never sent to the service.
    pub fn temp_id(&self) -> &str {
        &self.temp_id
    }

    pub fn registration_id(&self) -> &RegistrationId {
        &self.registration_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn record(&self) -> &RecordDraft {
        &self.record
    }

    pub fn signature(&self) -> DedupSignature {
        self.record.signature()
    }

    /// One-line description for review screens and logs.
    pub fn summary_line(&self) -> String {
        format!(
            "{}  {} {}  S/N {}  Inv {}  -> {}",
            self.registration_id,
            self.record.asset_type,
            self.record.model,
            self.record.serial_number,
            self.record.inventory_number,
            self.record.assignee
        )
    }
}

/// Generates a fresh queue-local temp id.
pub fn new_temp_id() -> String {
    format!("temp_{}", Uuid::new_v4().simple())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecordDraft {
        RecordDraft {
            asset_type: "Laptop".into(),
            model: "ThinkPad T14".into(),
            serial_number: "SN-001".into(),
            inventory_number: "INV-1000".into(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            assignee: Assignee::ExistingEmployee {
                employee_id: "4521".into(),
            },
            location: "Edificio principal".into(),
            assigned_area: None,
            status: AssetStatus::Active,
            capture_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            submitter_id: Some("T01-U02".into()),
            submitter_name: Some("Usuario 2 T1".into()),
            territorial: Some("Territorial 1".into()),
        }
    }

    #[test]
    fn test_assignee_resolve_prefers_ad_hoc_name() {
        let a = Assignee::resolve(Some("17"), Some("  Ana Pérez ")).unwrap();
        assert_eq!(
            a,
            Assignee::AdHocEmployee {
                name: "Ana Pérez".into()
            }
        );

        let b = Assignee::resolve(Some("17"), Some("   ")).unwrap();
        assert_eq!(
            b,
            Assignee::ExistingEmployee {
                employee_id: "17".into()
            }
        );

        assert_eq!(Assignee::resolve(None, None), Err(CoreError::MissingAssignee));
    }

    #[test]
    fn test_assignee_resolve_from_owned_input() {
        let typed_id = String::from(" 4521 ");
        let typed_name = String::new();

        let a = Assignee::resolve(Some(typed_id.as_str()), Some(typed_name.as_str())).unwrap();
        assert_eq!(
            a,
            Assignee::ExistingEmployee {
                employee_id: "4521".into()
            }
        );
    }

    #[test]
    fn test_assignee_serializes_tagged() {
        let json = serde_json::to_value(Assignee::AdHocEmployee { name: "Ana".into() }).unwrap();
        assert_eq!(json["kind"], "ad_hoc_employee");
        assert_eq!(json["name"], "Ana");
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("ACTIVO".parse::<AssetStatus>().unwrap(), AssetStatus::Active);
        assert_eq!("baja".parse::<AssetStatus>().unwrap(), AssetStatus::Decommissioned);
        assert!("roto".parse::<AssetStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&AssetStatus::Decommissioned).unwrap(),
            "\"baja\""
        );
    }

    #[test]
    fn test_assigned_area_default() {
        let mut d = draft();
        assert_eq!(d.assigned_area_or_default(), UNASSIGNED_AREA);
        d.assigned_area = Some("Sistemas".into());
        assert_eq!(d.assigned_area_or_default(), "Sistemas");
    }

    #[test]
    fn test_pending_record_survives_json() {
        let record = PendingRecord::new(
            draft(),
            new_temp_id(),
            RegistrationId::allocated("T01-U02", 7),
            Utc::now(),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: PendingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.registration_id().as_str(), "T01-U02-0007");
    }

    #[test]
    fn test_temp_ids_are_distinct() {
        assert_ne!(new_temp_id(), new_temp_id());
        assert!(new_temp_id().starts_with("temp_"));
    }
}

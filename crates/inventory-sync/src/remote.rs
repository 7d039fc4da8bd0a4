//! # Remote Client
//!
//! Single-record create call against the inventory service.
//!
//! ## Request Mapping
//! ```text
//! PendingRecord                         POST {base}/inventariocomputo/Create
//! ─────────────                         ────────────────────────────────────
//! registration_id          ──────────►  id_registro        ("SIN-ID" if blank)
//! asset_type               ──────────►  bien_informatico
//! model                    ──────────►  modelo
//! serial_number            ──────────►  numero_serie
//! inventory_number         ──────────►  numero_inventario
//! delivery_date            ──────────►  fecha_entrega      (YYYY-MM-DD)
//! location                 ──────────►  ubicacion
//! assigned_area            ──────────►  area_asignada      ("Sin asignar")
//! status                   ──────────►  estatus            (activo | baja)
//! capture_date             ──────────►  fecha_captura
//! submitter_id/territorial ──────────►  usuario_id / usuario_nombre / territorial
//!
//! assignee ExistingEmployee{id}   ──►  responsable = id,  contrato_adquisicion = ""
//! assignee AdHocEmployee{name}    ──►  responsable = "0", contrato_adquisicion = name
//! ```
//!
//! ## Failure Classification
//! ```text
//!   connect error / timeout / no response  → NetworkUnreachable
//!   422, or 4xx with an "errors" object    → ValidationError
//!   any other non-2xx                      → ServerError(status, body)
//!   anything else (unreadable response)    → UnknownError
//! ```
//!
//! One attempt per call. Retrying is the sync engine's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use crate::config::RemoteSettings;
use crate::error::SyncResult;
use inventory_core::{Assignee, PendingRecord};

/// `responsable` value sent for an assignee who is not in the lookup yet.
pub const AD_HOC_RESPONSIBLE: &str = "0";

// =============================================================================
// Outcome Types
// =============================================================================

/// The service accepted the record.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSuccess {
    /// Response body as returned by the service (`Null` if not JSON).
    pub payload: serde_json::Value,
}

/// Why a create call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The service could not be reached at all.
    NetworkUnreachable(String),

    /// The service answered with a failure status.
    ServerError { status: u16, body: String },

    /// The service rejected the payload. Resubmitting will not help.
    ValidationError {
        message: Option<String>,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// Anything that fits none of the above.
    UnknownError(String),
}

impl RemoteFailure {
    /// Whether the next pass may succeed without anyone editing the record.
    pub fn is_retryable(&self) -> bool {
        !self.is_validation()
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RemoteFailure::ValidationError { .. })
    }

    /// Short category label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteFailure::NetworkUnreachable(_) => "network_unreachable",
            RemoteFailure::ServerError { .. } => "server_error",
            RemoteFailure::ValidationError { .. } => "validation_error",
            RemoteFailure::UnknownError(_) => "unknown_error",
        }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteFailure::NetworkUnreachable(detail) => {
                write!(f, "Service unreachable: {}", detail)
            }
            RemoteFailure::ServerError { status, body } => {
                if body.is_empty() {
                    write!(f, "Server error {}", status)
                } else {
                    write!(f, "Server error {}: {}", status, truncate(body, 200))
                }
            }
            RemoteFailure::ValidationError {
                message,
                field_errors,
            } => {
                f.write_str("Rejected by the service")?;
                if let Some(message) = message {
                    write!(f, ": {}", message)?;
                }
                for (field, errors) in field_errors {
                    write!(f, "; {}: {}", field, errors.join(", "))?;
                }
                Ok(())
            }
            RemoteFailure::UnknownError(detail) => write!(f, "Unexpected error: {}", detail),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// =============================================================================
// Client Trait
// =============================================================================

/// Delivers one record to the inventory service.
#[async_trait]
pub trait InventoryRemote: Send + Sync {
    async fn register_asset(&self, record: &PendingRecord) -> Result<RemoteSuccess, RemoteFailure>;
}

// =============================================================================
// Wire Format
// =============================================================================

/// Body of the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAssetRequest {
    #[serde(rename = "id_registro")]
    pub registration_id: String,
    #[serde(rename = "bien_informatico")]
    pub asset_type: String,
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "numero_serie")]
    pub serial_number: String,
    #[serde(rename = "numero_inventario")]
    pub inventory_number: String,
    #[serde(rename = "contrato_adquisicion")]
    pub acquisition_contract: String,
    #[serde(rename = "fecha_entrega")]
    pub delivery_date: String,
    #[serde(rename = "responsable")]
    pub responsible: String,
    #[serde(rename = "ubicacion")]
    pub location: String,
    #[serde(rename = "area_asignada")]
    pub assigned_area: String,
    #[serde(rename = "estatus")]
    pub status: String,
    #[serde(rename = "fecha_captura")]
    pub capture_date: String,
    #[serde(rename = "usuario_id", skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<String>,
    #[serde(rename = "usuario_nombre", skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub territorial: Option<String>,
}

impl From<&PendingRecord> for RegisterAssetRequest {
    fn from(pending: &PendingRecord) -> Self {
        let record = pending.record();

        let (responsible, acquisition_contract) = match &record.assignee {
            Assignee::ExistingEmployee { employee_id } => (employee_id.clone(), String::new()),
            Assignee::AdHocEmployee { name } => (AD_HOC_RESPONSIBLE.to_string(), name.clone()),
        };

        RegisterAssetRequest {
            registration_id: pending.registration_id().wire_value().to_string(),
            asset_type: record.asset_type.clone(),
            model: record.model.clone(),
            serial_number: record.serial_number.clone(),
            inventory_number: record.inventory_number.clone(),
            acquisition_contract,
            delivery_date: record.delivery_date.format("%Y-%m-%d").to_string(),
            responsible,
            location: record.location.clone(),
            assigned_area: record.assigned_area_or_default().to_string(),
            status: record.status.as_wire().to_string(),
            capture_date: record.capture_date.format("%Y-%m-%d").to_string(),
            submitter_id: record.submitter().map(str::to_string),
            submitter_name: record.submitter_name.clone(),
            territorial: record.territorial.clone(),
        }
    }
}

/// Laravel-style validation body: `{"message": "...", "errors": {...}}`.
#[derive(Debug, Deserialize)]
struct ValidationBody {
    message: Option<String>,
    errors: Option<BTreeMap<String, FieldErrors>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldErrors {
    Many(Vec<String>),
    One(String),
}

impl FieldErrors {
    fn into_vec(self) -> Vec<String> {
        match self {
            FieldErrors::Many(v) => v,
            FieldErrors::One(s) => vec![s],
        }
    }
}

/// Classifies a non-success response.
fn classify_failure(status: reqwest::StatusCode, body: String) -> RemoteFailure {
    let parsed: Option<ValidationBody> = serde_json::from_str(&body).ok();

    if status.is_client_error() {
        let has_field_errors = parsed.as_ref().is_some_and(|b| b.errors.is_some());
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY || has_field_errors {
            let (message, errors) = match parsed {
                Some(b) => (b.message, b.errors.unwrap_or_default()),
                None => (None, BTreeMap::new()),
            };
            return RemoteFailure::ValidationError {
                message,
                field_errors: errors
                    .into_iter()
                    .map(|(field, errs)| (field, errs.into_vec()))
                    .collect(),
            };
        }
    }

    RemoteFailure::ServerError {
        status: status.as_u16(),
        body,
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// `InventoryRemote` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: reqwest::Client,
    create_url: Url,
}

impl HttpInventoryClient {
    pub fn new(settings: &RemoteSettings) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(HttpInventoryClient {
            client,
            create_url: settings.create_url()?,
        })
    }
}

#[async_trait]
impl InventoryRemote for HttpInventoryClient {
    async fn register_asset(&self, record: &PendingRecord) -> Result<RemoteSuccess, RemoteFailure> {
        let body = RegisterAssetRequest::from(record);

        debug!(
            registration_id = %body.registration_id,
            serial = %body.serial_number,
            "Sending capture to service"
        );

        let response = self
            .client
            .post(self.create_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    RemoteFailure::NetworkUnreachable(e.to_string())
                } else {
                    RemoteFailure::UnknownError(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteFailure::UnknownError(format!("unreadable response: {}", e)))?;

        if status.is_success() {
            let payload = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
            return Ok(RemoteSuccess { payload });
        }

        let failure = classify_failure(status, text);
        warn!(
            registration_id = %body.registration_id,
            status = status.as_u16(),
            kind = failure.kind(),
            "Service rejected capture"
        );
        Err(failure)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

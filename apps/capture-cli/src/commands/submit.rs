//! Submit command: the CLI stand-in for the capture form.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Args;
use serde_json::json;

use inventory_core::{AssetStatus, Assignee, CoreError, CoreResult, RecordDraft};
use inventory_sync::SubmissionOutcome;

use crate::app::App;
use crate::output::{print_error, print_info, print_json, print_success, print_warning, OutputFormat};

/// Fields of one capture
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Kind of equipment (laptop, printer, ...)
    #[arg(long)]
    pub asset_type: String,

    /// Model
    #[arg(long)]
    pub model: String,

    /// Serial number
    #[arg(long)]
    pub serial: String,

    /// Inventory number
    #[arg(long)]
    pub inventory_number: String,

    /// Date the asset was handed over (YYYY-MM-DD)
    #[arg(long)]
    pub delivery_date: NaiveDate,

    /// Id of an existing employee
    #[arg(long, conflicts_with = "assignee_name")]
    pub employee_id: Option<String>,

    /// Name of an assignee who is not in the employee list yet
    #[arg(long)]
    pub assignee_name: Option<String>,

    /// Where the asset is
    #[arg(long)]
    pub location: String,

    /// Assigned area (defaults to "Sin asignar")
    #[arg(long)]
    pub area: Option<String>,

    /// activo or baja
    #[arg(long, default_value = "activo")]
    pub status: AssetStatus,

    /// Capture date (defaults to today)
    #[arg(long)]
    pub capture_date: Option<NaiveDate>,

    /// Logged-in user id, used for registration ids
    #[arg(long, env = "INVENTORY_SUBMITTER_ID")]
    pub submitter_id: Option<String>,

    /// Logged-in user display name
    #[arg(long, env = "INVENTORY_SUBMITTER_NAME")]
    pub submitter_name: Option<String>,

    /// Territorial unit
    #[arg(long, env = "INVENTORY_TERRITORIAL")]
    pub territorial: Option<String>,
}

impl SubmitArgs {
    /// Builds the draft the queue and the service accept.
    pub fn into_draft(self, today: NaiveDate) -> CoreResult<RecordDraft> {
        let assignee =
            Assignee::resolve(self.employee_id.as_deref(), self.assignee_name.as_deref())?;

        for (field, value) in [
            ("asset_type", &self.asset_type),
            ("model", &self.model),
            ("serial", &self.serial),
            ("inventory_number", &self.inventory_number),
            ("location", &self.location),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::required(field));
            }
        }

        Ok(RecordDraft {
            asset_type: self.asset_type.trim().to_string(),
            model: self.model.trim().to_string(),
            serial_number: self.serial.trim().to_string(),
            inventory_number: self.inventory_number.trim().to_string(),
            delivery_date: self.delivery_date,
            assignee,
            location: self.location.trim().to_string(),
            assigned_area: self.area,
            status: self.status,
            capture_date: self.capture_date.unwrap_or(today),
            submitter_id: self.submitter_id,
            submitter_name: self.submitter_name,
            territorial: self.territorial,
        })
    }
}

pub async fn run(app: &App, args: SubmitArgs, format: OutputFormat) -> Result<()> {
    let draft = args.into_draft(Local::now().date_naive())?;
    let outcome = app.submission().submit(draft).await?;

    match format {
        OutputFormat::Json => print_json(&outcome_json(&outcome))?,
        OutputFormat::Table => {
            let message = outcome.message();
            match &outcome {
                SubmissionOutcome::Delivered { .. } => print_success(&message),
                SubmissionOutcome::Queued(_) => print_info(&message),
                SubmissionOutcome::AlreadyQueued { .. } => print_warning(&message),
                SubmissionOutcome::Rejected { .. } => print_error(&message),
            }
        }
    }

    if let SubmissionOutcome::Rejected { .. } = outcome {
        anyhow::bail!("capture rejected by the inventory service");
    }
    Ok(())
}

fn outcome_json(outcome: &SubmissionOutcome) -> serde_json::Value {
    let message = outcome.message();
    match outcome {
        SubmissionOutcome::Delivered {
            registration_id,
            payload,
        } => json!({
            "outcome": "delivered",
            "registration_id": registration_id,
            "payload": payload,
            "message": message,
        }),
        SubmissionOutcome::Queued(record) => json!({
            "outcome": "queued",
            "registration_id": record.registration_id(),
            "temp_id": record.temp_id(),
            "message": message,
        }),
        SubmissionOutcome::AlreadyQueued { existing } => json!({
            "outcome": "already_queued",
            "registration_id": existing,
            "message": message,
        }),
        SubmissionOutcome::Rejected {
            registration_id,
            failure,
        } => json!({
            "outcome": "rejected",
            "registration_id": registration_id,
            "kind": failure.kind(),
            "message": message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SubmitArgs,
    }

    fn parse(extra: &[&str]) -> SubmitArgs {
        let mut argv = vec![
            "submit",
            "--asset-type",
            "Laptop",
            "--model",
            " ThinkPad T14 ",
            "--serial",
            "PF-3XK9",
            "--inventory-number",
            "INV-001",
            "--delivery-date",
            "2024-03-01",
            "--location",
            "Edificio principal",
        ];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_draft_from_args() {
        let draft = parse(&["--employee-id", "4521", "--status", "baja"])
            .into_draft(today())
            .unwrap();

        assert_eq!(draft.model, "ThinkPad T14");
        assert_eq!(draft.status, AssetStatus::Decommissioned);
        assert_eq!(draft.capture_date, today());
        assert_eq!(
            draft.assignee,
            Assignee::ExistingEmployee {
                employee_id: "4521".into()
            }
        );
    }

    #[test]
    fn test_missing_assignee_is_rejected() {
        let err = parse(&[]).into_draft(today()).unwrap_err();
        assert_eq!(err, CoreError::MissingAssignee);
    }

    #[test]
    fn test_blank_required_field_is_rejected() {
        let mut args = parse(&["--assignee-name", "Laura Méndez"]);
        args.location = "  ".into();
        assert_eq!(args.into_draft(today()).unwrap_err(), CoreError::required("location"));
    }
}

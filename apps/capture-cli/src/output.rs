//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use inventory_core::PendingRecord;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the pending queue table
#[derive(Tabled, Serialize)]
pub struct PendingRow {
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Registration")]
    pub registration_id: String,
    #[tabled(rename = "Asset")]
    pub asset: String,
    #[tabled(rename = "Serial")]
    pub serial_number: String,
    #[tabled(rename = "Inventory")]
    pub inventory_number: String,
    #[tabled(rename = "Assignee")]
    pub assignee: String,
    #[tabled(rename = "Captured")]
    pub created_at: String,
}

impl PendingRow {
    pub fn new(position: usize, record: &PendingRecord) -> Self {
        let draft = record.record();
        PendingRow {
            position,
            registration_id: record.registration_id().to_string(),
            asset: format!("{} {}", draft.asset_type, draft.model),
            serial_number: draft.serial_number.clone(),
            inventory_number: draft.inventory_number.clone(),
            assignee: draft.assignee.to_string(),
            created_at: record.created_at().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return Ok(());
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
            Ok(())
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color an online/offline flag
pub fn color_online(online: bool) -> String {
    if online {
        "online".green().to_string()
    } else {
        "offline".red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use inventory_core::{AssetStatus, Assignee, RecordDraft, RegistrationId};

    #[test]
    fn test_pending_row_from_record() {
        let draft = RecordDraft {
            asset_type: "Monitor".into(),
            model: "P2422H".into(),
            serial_number: "CN-0ABC".into(),
            inventory_number: "INV-77".into(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            assignee: Assignee::AdHocEmployee {
                name: "Laura Méndez".into(),
            },
            location: "Planta baja".into(),
            assigned_area: None,
            status: AssetStatus::Active,
            capture_date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            submitter_id: Some("T02-U01".into()),
            submitter_name: None,
            territorial: None,
        };
        let created = Utc.with_ymd_and_hms(2024, 1, 16, 9, 30, 0).unwrap();
        let record = PendingRecord::new(
            draft,
            "temp_1".into(),
            RegistrationId::allocated("T02-U01", 7),
            created,
        );

        let row = PendingRow::new(1, &record);

        assert_eq!(row.registration_id, "T02-U01-0007");
        assert_eq!(row.asset, "Monitor P2422H");
        assert_eq!(row.created_at, "2024-01-16 09:30");
        assert!(row.assignee.contains("Laura Méndez"));
    }

    #[test]
    fn test_unserializable_json_is_an_error() {
        use std::collections::HashMap;

        let mut by_pair: HashMap<(u8, u8), u8> = HashMap::new();
        by_pair.insert((1, 2), 3);

        assert!(render_json(&by_pair).is_err());
        assert!(print_json(&by_pair).is_err());
        assert!(render_json(&serde_json::json!({ "pending": 2 })).is_ok());
    }
}

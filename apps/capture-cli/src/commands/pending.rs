//! Pending queue review and maintenance commands

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::app::App;
use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat, PendingRow};

/// List pending captures in send order
pub async fn list(app: &App, format: OutputFormat) -> Result<()> {
    let records = app.queue.list().await?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            println!("{}", "Pending Captures".bold());
            println!("{}", "=".repeat(60));
            let rows: Vec<PendingRow> = records
                .iter()
                .enumerate()
                .map(|(i, r)| PendingRow::new(i + 1, r))
                .collect();
            print_table(&rows, format)?;
            if !rows.is_empty() {
                println!("\nTotal: {} pending", rows.len());
            }
        }
    }
    Ok(())
}

/// Number of pending captures
pub async fn count(app: &App, format: OutputFormat) -> Result<()> {
    let pending = app.queue.count().await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "pending": pending }))?,
        OutputFormat::Table => println!("{}", pending),
    }
    Ok(())
}

/// Remove duplicate captures
pub async fn repair(app: &App) -> Result<()> {
    let removed = app.queue.repair_duplicates().await?;

    if removed == 0 {
        print_success("No duplicate captures found");
    } else {
        print_success(&format!("Removed {} duplicate capture(s)", removed));
    }
    Ok(())
}

/// Discard every pending capture
pub async fn purge(app: &App, yes: bool) -> Result<()> {
    if !yes {
        let pending = app.queue.count().await?;
        print_warning(&format!(
            "This discards {} unsent capture(s). Run again with --yes to confirm.",
            pending
        ));
        return Ok(());
    }

    let discarded = app.queue.purge_all().await?;
    print_success(&format!("Discarded {} pending capture(s)", discarded));
    Ok(())
}

//! Sync, watch and status commands

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use inventory_sync::{
    NetworkMonitor, PassOutcome, SyncAgent, SyncEventEmitter, SyncReport, SyncStatus, SyncTrigger,
};

use crate::app::App;
use crate::output::{
    color_online, print_error, print_info, print_json, print_success, print_warning, OutputFormat,
};

/// Run one pass now
pub async fn sync_once(app: &App, format: OutputFormat) -> Result<()> {
    let outcome = app.engine().run_pass(SyncTrigger::Manual).await?;

    let PassOutcome::Completed(report) = outcome else {
        print_warning("A sync pass is already running");
        return Ok(());
    };

    match format {
        OutputFormat::Json => print_json(&report_json(&report))?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

/// Keep syncing until Ctrl-C
pub async fn watch(app: &App) -> Result<()> {
    let monitor = NetworkMonitor::new(app.prober.probe_reachable().await);
    let agent = SyncAgent::with_emitter(
        app.engine(),
        monitor,
        app.config.sync.clone(),
        Arc::new(ConsoleEmitter),
    );
    let (handle, task) = agent.spawn();

    print_info("Watching for connectivity changes. Press Ctrl-C to stop.");

    // Drain whatever is already queued before waiting for triggers.
    if let Err(e) = handle.sync_now().await {
        warn!(error = %e, "Initial sync pass failed");
    }

    tokio::signal::ctrl_c().await?;
    info!("Stopping watch");

    handle.shutdown().await;
    task.await?;
    Ok(())
}

/// Probe and print queue status
pub async fn status(app: &App, format: OutputFormat) -> Result<()> {
    let online = app.prober.probe_reachable().await;
    let pending = app.queue.count().await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "device_id": app.config.device_id(),
            "service": app.config.remote.base_url,
            "online": online,
            "pending": pending,
        }))?,
        OutputFormat::Table => {
            println!("{}", "Capture Status".bold());
            println!("{}", "=".repeat(60));
            println!("Device:   {}", app.config.device_id().cyan());
            println!("Service:  {} ({})", app.config.remote.base_url, color_online(online));
            println!("Pending:  {}", pending);
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let summary = report.summary();
    if report.offline || report.failed > 0 || report.held > 0 {
        print_warning(&summary);
    } else {
        print_success(&summary);
    }

    for error in &report.errors {
        let line = format!("{}: {}", error.registration_id, error.failure);
        if error.failure.is_validation() {
            print_error(&line);
        } else {
            println!("  {} {}", "-".dimmed(), line);
        }
    }
}

fn report_json(report: &SyncReport) -> serde_json::Value {
    let errors: Vec<_> = report
        .errors
        .iter()
        .map(|e| {
            json!({
                "temp_id": e.temp_id,
                "registration_id": e.registration_id,
                "kind": e.failure.kind(),
                "retryable": e.failure.is_retryable(),
                "message": e.failure.to_string(),
            })
        })
        .collect();

    json!({
        "offline": report.offline,
        "synced": report.synced,
        "failed": report.failed,
        "held": report.held,
        "summary": report.summary(),
        "errors": errors,
    })
}

/// Prints agent events while `watch` runs.
struct ConsoleEmitter;

impl SyncEventEmitter for ConsoleEmitter {
    fn emit_status(&self, status: &SyncStatus) {
        info!(
            online = status.online,
            pending = status.pending_count,
            "Sync status"
        );
    }

    fn emit_progress(&self, current: usize, total: usize) {
        if current > 0 {
            info!(current, total, "Sync progress");
        }
    }

    fn emit_report(&self, report: &SyncReport) {
        if report.offline || report.synced + report.failed + report.held > 0 {
            print_report(report);
        }
    }

    fn emit_error(&self, message: &str, _retryable: bool) {
        print_error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_core::RegistrationId;
    use inventory_sync::{RecordError, RemoteFailure};

    #[test]
    fn test_report_json_shape() {
        let report = SyncReport {
            offline: false,
            synced: 1,
            failed: 1,
            held: 0,
            errors: vec![RecordError {
                temp_id: "temp_a".into(),
                registration_id: RegistrationId::allocated("T01-U02", 4),
                failure: RemoteFailure::ServerError {
                    status: 502,
                    body: "bad gateway".into(),
                },
            }],
        };

        let value = report_json(&report);

        assert_eq!(value["synced"], 1);
        assert_eq!(value["errors"][0]["registration_id"], "T01-U02-0004");
        assert_eq!(value["errors"][0]["kind"], "server_error");
        assert_eq!(value["errors"][0]["retryable"], true);
    }
}

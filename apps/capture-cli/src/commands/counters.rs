//! Registration counter commands

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::app::App;
use crate::output::{print_success, print_table, print_warning, OutputFormat};

/// Row for the counters table
#[derive(Tabled, Serialize)]
struct CounterRow {
    #[tabled(rename = "Submitter")]
    submitter: String,
    #[tabled(rename = "Last issued")]
    last_issued: u64,
}

/// Show the last number issued per submitter
pub async fn show(app: &App, format: OutputFormat) -> Result<()> {
    let rows: Vec<CounterRow> = app
        .queue
        .ids()
        .snapshot()
        .await?
        .into_iter()
        .map(|(submitter, last_issued)| CounterRow {
            submitter,
            last_issued,
        })
        .collect();

    print_table(&rows, format)?;
    Ok(())
}

/// Forget all counters
pub async fn reset(app: &App, yes: bool) -> Result<()> {
    if !yes {
        print_warning(
            "Resetting restarts numbering at 1 and may reissue ids the service already holds. \
             Run again with --yes to confirm.",
        );
        return Ok(());
    }

    app.queue.ids().reset().await?;
    print_success("Registration counters reset");
    Ok(())
}

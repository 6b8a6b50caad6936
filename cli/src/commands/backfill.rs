use anyhow::Result;
use serde::Serialize;
use std::process;

use kcal_core::backfill::BackfillOutcome;
use kcal_core::models::EntryId;
use kcal_core::service::Tracker;

use super::helpers::{json_error, parse_date};
use super::log::describe;

#[derive(Serialize)]
struct OutcomeRow {
    id: EntryId,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn describe_outcome(outcome: &BackfillOutcome) -> (&'static str, Option<String>) {
    match outcome {
        BackfillOutcome::Applied(entry) => ("applied", Some(describe(entry))),
        BackfillOutcome::Unknown => ("unknown", None),
        BackfillOutcome::Unavailable(reason) => ("unavailable", Some(reason.clone())),
        BackfillOutcome::Cancelled => ("cancelled", None),
        BackfillOutcome::AlreadyPopulated => ("complete", None),
        BackfillOutcome::Failed(reason) => ("failed", Some(reason.clone())),
    }
}

/// Retry nutrition lookups for every entry on a date that is still missing values.
pub(crate) async fn cmd_backfill(
    tracker: &Tracker,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let scheduled = tracker.retry_backfill(date)?;

    if scheduled.is_empty() {
        if json {
            println!("{}", json_error(&format!("Nothing to backfill for {date}")));
        } else {
            eprintln!("Nothing to backfill for {date}");
        }
        process::exit(2);
    }

    let mut rows = Vec::with_capacity(scheduled.len());
    for handle in scheduled {
        let id = handle.id();
        let (status, detail) = describe_outcome(&handle.outcome().await);
        rows.push(OutcomeRow { id, status, detail });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            let id = row.id;
            let status = row.status;
            match &row.detail {
                Some(detail) => println!("[{id}] {status}: {detail}"),
                None => println!("[{id}] {status}"),
            }
        }
    }

    Ok(())
}

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use kcal_core::csv_io::{CsvRow, parse_csv};
use kcal_core::service::Tracker;

pub(crate) fn cmd_export(tracker: &Tracker, path: Option<&Path>) -> Result<()> {
    let rows = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            let rows = tracker.export_csv(BufWriter::new(file))?;
            eprintln!("Exported {rows} entries to {}", path.display());
            rows
        }
        None => tracker.export_csv(io::stdout().lock())?,
    };
    tracing::debug!(rows, "export finished");
    Ok(())
}

pub(crate) async fn cmd_import(
    tracker: &Tracker,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let open = || {
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
    };

    if dry_run {
        let rows = parse_csv(open()?)?;
        let foods = rows.iter().filter(|r| matches!(r, CsvRow::Food(_))).count();
        let water = rows.len() - foods;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "dry_run": true,
                    "rows_parsed": rows.len(),
                    "foods_imported": foods,
                    "water_imported": water,
                })
            );
        } else {
            println!("Dry run, no changes made.\n");
            println!("  Rows parsed:    {}", rows.len());
            println!("  Foods to add:   {foods}");
            println!("  Water to add:   {water}");
        }
        return Ok(());
    }

    let summary = tracker.import_csv(open()?)?;
    // Imported rows without nutrition are looked up before exiting
    let looked_up = tracker.wait_for_all_backfills().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:    {}", summary.rows_parsed);
        println!("  Foods added:    {}", summary.foods_imported);
        println!("  Water added:    {}", summary.water_imported);
        println!("  Dates spanned:  {}", summary.dates_spanned);
        if looked_up > 0 {
            println!("  Looked up:      {looked_up}");
        }
    }

    Ok(())
}

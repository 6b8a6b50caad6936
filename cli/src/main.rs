mod commands;
mod config;
mod openfoodfacts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    LogArgs, cmd_backfill, cmd_delete, cmd_export, cmd_foods, cmd_goal_clear, cmd_goal_set,
    cmd_goal_show, cmd_history, cmd_import, cmd_log, cmd_summary, cmd_water,
};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use kcal_core::lookup::{Chained, NutritionLookup, StaticTable};
use kcal_core::service::Tracker;

const DEFAULT_LOG_FILTER: &str = "kcal=warn,kcal_core=warn";

#[derive(Parser)]
#[command(
    name = "kcal",
    version,
    about = "Log food and water, see your daily totals"
)]
struct Cli {
    /// Only use the built-in food table for nutrition lookups
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a food; missing nutrition is looked up automatically
    Log {
        /// Food name
        food: String,
        /// Number of items (default: 1 when no weight is given)
        #[arg(short, long)]
        quantity: Option<f64>,
        /// Weight (e.g. "150g", "1.5 oz", "2 tbsp")
        #[arg(short, long)]
        weight: Option<String>,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Calories, if known
        #[arg(long)]
        calories: Option<f64>,
        /// Protein in grams, if known
        #[arg(long)]
        protein: Option<f64>,
        /// Carbs in grams, if known
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat in grams, if known
        #[arg(long)]
        fat: Option<f64>,
        /// Don't wait for the nutrition lookup
        #[arg(long)]
        no_wait: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log water (e.g. "250", "500ml", "0.5l")
    Water {
        amount: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food or water entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily summary (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show totals for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the daily calorie goal
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Retry nutrition lookups for entries still missing values
    Backfill {
        /// Date to backfill (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in food table
    Foods {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all entries as CSV
    Export {
        /// Output file (default: stdout)
        file: Option<PathBuf>,
    },
    /// Import entries from a CSV export
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Validate the file without importing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set the daily calorie goal
    Set {
        /// Daily calories
        calories: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the daily calorie goal
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset the goal to the default
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn build_lookup(offline: bool) -> Result<Arc<dyn NutritionLookup>> {
    let table: Arc<dyn NutritionLookup> = Arc::new(StaticTable::new());
    if offline {
        return Ok(table);
    }
    let off: Arc<dyn NutritionLookup> = Arc::new(OpenFoodFactsClient::new()?);
    Ok(Arc::new(Chained::new(table, off)))
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let lookup = build_lookup(cli.offline)?;
    let tracker = Tracker::open(&config.db_path, lookup)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    tracing::debug!(db = %config.db_path.display(), "database opened");

    match cli.command {
        Commands::Log {
            food,
            quantity,
            weight,
            meal,
            date,
            calories,
            protein,
            carbs,
            fat,
            no_wait,
            json,
        } => {
            let args = LogArgs {
                food,
                quantity,
                weight,
                meal,
                date,
                calories,
                protein,
                carbs,
                fat,
                no_wait,
                json,
            };
            cmd_log(&tracker, args).await
        }
        Commands::Water { amount, date, json } => cmd_water(&tracker, &amount, date, json),
        Commands::Delete { entry_id, json } => cmd_delete(&tracker, &entry_id, json),
        Commands::Summary { date, json } => cmd_summary(&tracker, date, json),
        Commands::History { days, json } => cmd_history(&tracker, days, json),
        Commands::Goal { command } => match command {
            GoalCommands::Set { calories, json } => cmd_goal_set(&tracker, calories, json),
            GoalCommands::Show { json } => cmd_goal_show(&tracker, json),
            GoalCommands::Clear { json } => cmd_goal_clear(&tracker, json),
        },
        Commands::Backfill { date, json } => cmd_backfill(&tracker, date, json).await,
        Commands::Foods { search, json } => cmd_foods(search.as_deref(), json),
        Commands::Export { file } => cmd_export(&tracker, file.as_deref()),
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&tracker, &file, dry_run, json).await,
    }
}

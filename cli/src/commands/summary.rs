use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use kcal_core::models::DailySummary;
use kcal_core::service::Tracker;

use super::helpers::{fmt_opt, format_amount, no_neg_zero, parse_date, truncate};

const BAR_WIDTH: usize = 30;

fn progress_bar(progress: f64) -> String {
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((progress.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn print_summary(summary: &DailySummary) {
    let date = &summary.date;
    println!("=== {date} ===\n");

    for group in &summary.meals {
        let meal_label = group.meal.as_str().to_uppercase();
        let sub_cal = no_neg_zero(group.subtotal.calories);
        println!("  {meal_label} ({sub_cal:.0} kcal)");
        for e in &group.entries {
            let id = e.id;
            let name = truncate(&e.name, 40);
            let amount = format_amount(e);
            let cal = fmt_opt(e.calories, " kcal");
            let p = fmt_opt(e.protein, "g");
            let c = fmt_opt(e.carbs, "g");
            let f = fmt_opt(e.fat, "g");
            println!("    [{id}] {name} {amount}: {cal} | P:{p} C:{c} F:{f}");
        }
        println!();
    }

    if !summary.water.is_empty() {
        let water = summary.water_ml;
        println!("  WATER ({water:.0} ml)");
        for w in &summary.water {
            let id = w.id;
            let ml = w.amount_ml;
            println!("    [{id}] {ml:.0} ml");
        }
        println!();
    }

    let t = &summary.totals;
    let (cal, p, c, f) = (
        no_neg_zero(t.calories),
        no_neg_zero(t.protein),
        no_neg_zero(t.carbs),
        no_neg_zero(t.fat),
    );
    println!("  TOTAL: {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");

    let share = &summary.macro_share;
    if share.protein_pct + share.carbs_pct + share.fat_pct > 0.0 {
        let (sp, sc, sf) = (share.protein_pct, share.carbs_pct, share.fat_pct);
        println!("  MACROS: P:{sp:.0}% C:{sc:.0}% F:{sf:.0}%");
    }

    let goal = summary.goal.calorie_goal;
    let remaining = no_neg_zero(summary.remaining_calories);
    let pct = summary.progress * 100.0;
    println!("  GOAL: {goal:.0} kcal | REMAINING: {remaining:.0} kcal");
    println!("  {} {pct:.0}%", progress_bar(summary.progress));

    if summary.pending_nutrition > 0 {
        let n = summary.pending_nutrition;
        let noun = if n == 1 { "entry" } else { "entries" };
        println!("\n  {n} {noun} still missing nutrition; run `kcal backfill`");
    }
}

pub(crate) fn cmd_summary(tracker: &Tracker, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = tracker.summary(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.meals.is_empty() && summary.water.is_empty() {
        let date = &summary.date;
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    print_summary(&summary);
    Ok(())
}

pub(crate) fn cmd_history(tracker: &Tracker, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Goal")]
        goal: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Water")]
        water: String,
    }

    let today = Local::now().date_naive();
    let summaries = tracker.history(today, u64::from(days))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries
        .iter()
        .all(|s| s.meals.is_empty() && s.water.is_empty())
    {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| {
            let cal = no_neg_zero(s.totals.calories);
            let p = no_neg_zero(s.totals.protein);
            let c = no_neg_zero(s.totals.carbs);
            let f = no_neg_zero(s.totals.fat);
            let pct = s.progress * 100.0;
            let water = s.water_ml;
            HistoryRow {
                date: s.date.clone(),
                calories: format!("{cal:.0}"),
                goal: format!("{pct:.0}%"),
                protein: format!("{p:.0}g"),
                carbs: format!("{c:.0}g"),
                fat: format!("{f:.0}g"),
                water: format!("{water:.0} ml"),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

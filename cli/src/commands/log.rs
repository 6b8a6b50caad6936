use anyhow::Result;
use std::process;

use kcal_core::backfill::BackfillOutcome;
use kcal_core::models::{FoodEntry, FoodEntryInput, MealType, WaterEntryInput};
use kcal_core::service::Tracker;

use super::helpers::{
    fmt_opt, format_amount, json_error, parse_date, parse_entry_id, parse_volume, parse_weight,
};

pub(crate) struct LogArgs {
    pub food: String,
    pub quantity: Option<f64>,
    pub weight: Option<String>,
    pub meal: String,
    pub date: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub no_wait: bool,
    pub json: bool,
}

pub(crate) fn describe(entry: &FoodEntry) -> String {
    let name = &entry.name;
    let amount = format_amount(entry);
    let meal = entry.meal;
    let cal = fmt_opt(entry.calories, " kcal");
    let p = fmt_opt(entry.protein, "g");
    let c = fmt_opt(entry.carbs, "g");
    let f = fmt_opt(entry.fat, "g");
    format!("{name} {amount} for {meal}: {cal} | P:{p} C:{c} F:{f}")
}

pub(crate) async fn cmd_log(tracker: &Tracker, args: LogArgs) -> Result<()> {
    let meal: MealType = args.meal.parse()?;
    let date = parse_date(args.date)?;
    let weight = args.weight.as_deref().map(parse_weight).transpose()?;
    // A bare `kcal log apple` means one item
    let quantity = args.quantity.or(weight.is_none().then_some(1.0));

    let (entry, backfill) = tracker.add_food_with_backfill(FoodEntryInput {
        name: args.food,
        quantity,
        weight,
        calories: args.calories,
        protein: args.protein,
        carbs: args.carbs,
        fat: args.fat,
        meal,
        date: Some(date),
    })?;

    let (entry, note) = match backfill {
        Some(handle) if !args.no_wait => match handle.outcome().await {
            BackfillOutcome::Applied(updated) => (updated, None),
            BackfillOutcome::Unknown => (
                entry,
                Some("No nutrition facts found; pass --calories etc. to fill them in"),
            ),
            BackfillOutcome::Unavailable(_) | BackfillOutcome::Failed(_) => (
                entry,
                Some("Nutrition lookup unavailable; run `kcal backfill` later"),
            ),
            BackfillOutcome::Cancelled | BackfillOutcome::AlreadyPopulated => (entry, None),
        },
        _ => (entry, None),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let id = entry.id;
        println!("Logged [{id}] {}", describe(&entry));
        if let Some(note) = note {
            eprintln!("{note}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_water(
    tracker: &Tracker,
    amount: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let amount_ml = parse_volume(amount)?;
    let date = parse_date(date)?;
    let entry = tracker.add_water(&WaterEntryInput {
        amount_ml,
        date: Some(date),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let total = kcal_core::aggregate::water_total(&tracker.list_water_by_date(date)?);
        let id = entry.id;
        println!("Logged [{id}] {amount_ml:.0} ml water ({total:.0} ml on {date})");
    }
    Ok(())
}

pub(crate) fn cmd_delete(tracker: &Tracker, entry_id: &str, json: bool) -> Result<()> {
    let id = parse_entry_id(entry_id)?;
    if tracker.remove_entry(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted entry {id}");
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Entry {id} not found")));
        } else {
            eprintln!("Entry {id} not found");
        }
        process::exit(2);
    }
}

use std::io::{Read, Write};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{
    DayLog, EntryId, FoodEntryInput, MealType, WaterEntryInput, parse_date, validate_food_input,
    validate_water_input,
};

pub const HEADER: [&str; 12] = [
    "kind", "id", "date", "meal", "name", "quantity", "weight_g", "calories", "protein", "carbs",
    "fat", "amount_ml",
];

/// One validated row of an import file.
#[derive(Debug, Clone)]
pub enum CsvRow {
    Food(FoodEntryInput),
    Water(WaterEntryInput),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub foods_imported: usize,
    pub water_imported: usize,
    pub dates_spanned: usize,
}

fn opt(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// Write every entry of `logs` as CSV. Returns the number of rows written.
pub fn write_csv<W: Write>(writer: W, logs: &[(NaiveDate, DayLog)]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER).context("Failed to write CSV header")?;

    let mut rows = 0;
    for (date, log) in logs {
        let date = date.to_string();
        for f in &log.foods {
            wtr.write_record([
                "food".to_string(),
                f.id.to_string(),
                date.clone(),
                f.meal.to_string(),
                f.name.clone(),
                opt(f.quantity),
                opt(f.weight),
                opt(f.calories),
                opt(f.protein),
                opt(f.carbs),
                opt(f.fat),
                String::new(),
            ])
            .context("Failed to write CSV row")?;
            rows += 1;
        }
        for w in &log.water {
            wtr.write_record([
                "water".to_string(),
                w.id.to_string(),
                date.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                w.amount_ml.to_string(),
            ])
            .context("Failed to write CSV row")?;
            rows += 1;
        }
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows)
}

/// Parse and validate an export file.
///
/// Every row goes through the same checks as a manual add, so a bad row
/// rejects the whole file before anything is stored. Ids in the file are
/// ignored; imported entries get fresh ones.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| Error::validation(format!("failed to read CSV headers: {e}")))?
        .clone();

    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let required = |name: &str| {
        col(name).ok_or_else(|| Error::validation(format!("missing required column: {name}")))
    };

    let idx_kind = required("kind")?;
    let idx_date = required("date")?;
    let idx_meal = col("meal");
    let idx_name = col("name");
    let idx_quantity = col("quantity");
    let idx_weight = col("weight_g");
    let idx_calories = col("calories");
    let idx_protein = col("protein");
    let idx_carbs = col("carbs");
    let idx_fat = col("fat");
    let idx_amount = col("amount_ml");

    let today = Local::now().date_naive();
    let mut rows = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let record =
            result.map_err(|e| Error::validation(format!("row {line}: malformed CSV: {e}")))?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let number = |idx: Option<usize>, name: &str| -> Result<Option<f64>> {
            let raw = field(idx);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>()
                .map(Some)
                .map_err(|_| Error::validation(format!("row {line}: invalid {name} '{raw}'")))
        };
        let at_row = |e: Error| match e {
            Error::Validation(msg) => Error::Validation(format!("row {line}: {msg}")),
            other => other,
        };

        let kind = field(Some(idx_kind));
        if kind.is_empty() && record.iter().all(str::is_empty) {
            continue; // blank line
        }
        let date = parse_date(field(Some(idx_date))).map_err(at_row)?;

        match kind.to_lowercase().as_str() {
            "food" => {
                let meal = match field(idx_meal) {
                    "" => MealType::default(),
                    m => m.parse().map_err(at_row)?,
                };
                let input = FoodEntryInput {
                    name: field(idx_name).to_string(),
                    quantity: number(idx_quantity, "quantity")?,
                    weight: number(idx_weight, "weight_g")?,
                    calories: number(idx_calories, "calories")?,
                    protein: number(idx_protein, "protein")?,
                    carbs: number(idx_carbs, "carbs")?,
                    fat: number(idx_fat, "fat")?,
                    meal,
                    date: Some(date),
                };
                validate_food_input(input.clone(), EntryId::new(), today, String::new())
                    .map_err(at_row)?;
                rows.push(CsvRow::Food(input));
            }
            "water" => {
                let amount_ml = number(idx_amount, "amount_ml")?.ok_or_else(|| {
                    Error::validation(format!("row {line}: water row needs amount_ml"))
                })?;
                let input = WaterEntryInput {
                    amount_ml,
                    date: Some(date),
                };
                validate_water_input(&input, EntryId::new(), today, String::new())
                    .map_err(at_row)?;
                rows.push(CsvRow::Water(input));
            }
            other => {
                return Err(Error::validation(format!(
                    "row {line}: unknown kind '{other}'. Must be food or water"
                )));
            }
        }
    }

    Ok(rows)
}

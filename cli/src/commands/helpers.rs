use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use kcal_core::models::{EntryId, FoodEntry, convert_to_grams};

/// Parse a weight like "150", "150g", "1.5 oz" or "2tbsp" into grams.
pub(crate) fn parse_weight(s: &str) -> Result<f64> {
    let s = s.trim();

    // Plain grams: "150" or "150g"
    if let Ok(g) = parse_positive(s.trim_end_matches('g').trim()) {
        return Ok(g);
    }

    let (qty, unit) = split_number_unit(s)
        .with_context(|| format!("Invalid weight: '{s}'. Use '150g', '1.5 oz', '2 tbsp', etc."))?;
    if qty <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    let Some((grams, is_approx)) = convert_to_grams(qty, unit) else {
        bail!("Unknown unit '{unit}' in '{s}'. Supported: g, kg, lb, oz, tbsp, tsp, ml, l");
    };
    if is_approx {
        eprintln!("Note: {qty} {unit} ≈ {grams:.0}g (approximate, assumes water density)");
    }
    Ok(grams)
}

/// Parse a water amount like "250", "250ml" or "0.5 l" into millilitres.
pub(crate) fn parse_volume(s: &str) -> Result<f64> {
    let s = s.trim();

    if let Ok(ml) = parse_positive(s.trim_end_matches("ml").trim()) {
        return Ok(ml);
    }

    let (qty, unit) = split_number_unit(s)
        .with_context(|| format!("Invalid amount: '{s}'. Use '250', '250ml' or '0.5l'"))?;
    match unit.to_lowercase().as_str() {
        "l" | "liter" | "liters" | "litre" | "litres" if qty > 0.0 => Ok(qty * 1000.0),
        "cl" if qty > 0.0 => Ok(qty * 10.0),
        "l" | "liter" | "liters" | "litre" | "litres" | "cl" => {
            bail!("Amount must be greater than 0")
        }
        _ => bail!("Unknown unit '{unit}' in '{s}'. Supported: ml, cl, l"),
    }
}

fn parse_positive(s: &str) -> Result<f64> {
    let value: f64 = s.parse().with_context(|| format!("Invalid number: '{s}'"))?;
    if !value.is_finite() || value <= 0.0 {
        bail!("Value must be greater than 0");
    }
    Ok(value)
}

/// Split "500ml", "2.5tbsp" or "1.5 oz" into (quantity, unit).
fn split_number_unit(s: &str) -> Option<(f64, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let qty: f64 = num_part.trim().parse().ok()?;
    let unit = unit_part.trim();
    if unit.is_empty() {
        return None;
    }
    Some((qty, unit))
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn parse_entry_id(s: &str) -> Result<EntryId> {
    s.parse::<EntryId>()
        .with_context(|| format!("Invalid entry ID '{s}'. Copy it from `kcal summary`"))
}

pub(crate) fn format_amount(entry: &FoodEntry) -> String {
    let fmt = |v: f64| {
        if v.fract() == 0.0 {
            format!("{v:.0}")
        } else {
            format!("{v}")
        }
    };
    match (entry.quantity, entry.weight) {
        (Some(q), Some(w)) => format!("{} × {}g", fmt(q), fmt(w)),
        (Some(q), None) => format!("{} ×", fmt(q)),
        (None, Some(w)) => format!("{}g", fmt(w)),
        (None, None) => String::new(),
    }
}

/// Nutrition value for display; unknown values show as "?".
pub(crate) fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    v.map_or_else(|| "?".to_string(), |v| format!("{:.0}{unit}", no_neg_zero(v)))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

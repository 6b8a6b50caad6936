use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::{
    DATE_FORMAT, DailyGoal, DailySummary, FoodEntry, MacroShare, MealGroup, MealType, Totals,
    WaterEntry,
};

/// Sum calories and macros. Unknown values count as 0.
#[must_use]
pub fn totals(entries: &[FoodEntry]) -> Totals {
    entries.iter().fold(Totals::default(), |acc, e| Totals {
        calories: acc.calories + e.calories.unwrap_or(0.0),
        protein: acc.protein + e.protein.unwrap_or(0.0),
        carbs: acc.carbs + e.carbs.unwrap_or(0.0),
        fat: acc.fat + e.fat.unwrap_or(0.0),
    })
}

/// Fraction of the calorie goal reached, in `[0, 1]`.
pub fn progress(totals: &Totals, goal: &DailyGoal) -> Result<f64> {
    if !goal.calorie_goal.is_finite() || goal.calorie_goal <= 0.0 {
        return Err(Error::Config(format!(
            "calorie goal must be greater than 0 (got {})",
            goal.calorie_goal
        )));
    }
    Ok((totals.calories / goal.calorie_goal).clamp(0.0, 1.0))
}

/// Each macro's share of the combined macro grams. All zero when nothing was eaten.
#[must_use]
pub fn macro_share(totals: &Totals) -> MacroShare {
    let sum = totals.protein + totals.carbs + totals.fat;
    if sum <= 0.0 {
        return MacroShare::default();
    }
    MacroShare {
        protein_pct: totals.protein / sum * 100.0,
        carbs_pct: totals.carbs / sum * 100.0,
        fat_pct: totals.fat / sum * 100.0,
    }
}

#[must_use]
pub fn water_total(water: &[WaterEntry]) -> f64 {
    water.iter().map(|w| w.amount_ml).sum()
}

pub fn build_daily_summary(
    date: NaiveDate,
    foods: Vec<FoodEntry>,
    water: Vec<WaterEntry>,
    goal: DailyGoal,
) -> Result<DailySummary> {
    let day_totals = totals(&foods);
    let day_progress = progress(&day_totals, &goal)?;
    let pending_nutrition = foods.iter().filter(|e| e.needs_nutrition()).count();

    let mut meals = Vec::new();
    for meal in MealType::ALL {
        let entries: Vec<FoodEntry> = foods.iter().filter(|e| e.meal == meal).cloned().collect();
        if entries.is_empty() {
            continue;
        }
        let subtotal = totals(&entries);
        meals.push(MealGroup {
            meal,
            entries,
            subtotal,
        });
    }

    Ok(DailySummary {
        date: date.format(DATE_FORMAT).to_string(),
        meals,
        totals: day_totals,
        water_ml: water_total(&water),
        water,
        goal,
        progress: day_progress,
        remaining_calories: goal.calorie_goal - day_totals.calories,
        macro_share: macro_share(&day_totals),
        pending_nutrition,
    })
}

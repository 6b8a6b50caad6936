use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_CALORIE_GOAL: f64 = 2000.0;

/// Stable identity of a logged entry. Never derived from position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for EntryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::validation(format!("'{s}' is not a valid entry id")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" | "snacks" | "other" => Ok(MealType::Snack),
            _ => Err(Error::validation(format!(
                "invalid meal type '{s}'. Must be one of: breakfast, lunch, dinner, snack"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FoodEntryInput {
    pub name: String,
    pub quantity: Option<f64>,
    pub weight: Option<f64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub meal: MealType,
    /// Defaults to today (local time) when absent.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: EntryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub meal: MealType,
    pub date: NaiveDate,
    pub created_at: String,
}

impl FoodEntry {
    /// True while any nutrition field is still unknown.
    #[must_use]
    pub fn needs_nutrition(&self) -> bool {
        self.calories.is_none()
            || self.protein.is_none()
            || self.carbs.is_none()
            || self.fat.is_none()
    }

    /// Fill unknown nutrition fields from `patch`. Populated fields are kept.
    /// Returns whether anything changed.
    pub fn apply_patch(&mut self, patch: &NutritionPatch) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.calories, patch.calories),
            (&mut self.protein, patch.protein),
            (&mut self.carbs, patch.carbs),
            (&mut self.fat, patch.fat),
        ] {
            if slot.is_none() && value.is_some() {
                *slot = value;
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaterEntryInput {
    pub amount_ml: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterEntry {
    pub id: EntryId,
    pub amount_ml: f64,
    pub date: NaiveDate,
    pub created_at: String,
}

/// Everything logged for one calendar date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayLog {
    pub foods: Vec<FoodEntry>,
    pub water: Vec<WaterEntry>,
}

impl DayLog {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foods.is_empty() && self.water.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyGoal {
    pub calorie_goal: f64,
}

impl DailyGoal {
    pub fn new(calorie_goal: f64) -> Result<Self> {
        if !calorie_goal.is_finite() || calorie_goal <= 0.0 {
            return Err(Error::Config(format!(
                "calorie goal must be greater than 0 (got {calorie_goal})"
            )));
        }
        Ok(Self { calorie_goal })
    }
}

impl Default for DailyGoal {
    fn default() -> Self {
        Self {
            calorie_goal: DEFAULT_CALORIE_GOAL,
        }
    }
}

/// The amount a set of nutrition facts refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "per", content = "grams")]
pub enum ReferenceServing {
    Grams(f64),
    Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub serving: ReferenceServing,
    pub source: String,
}

impl NutritionFacts {
    /// Per-100g facts, the usual shape of food databases.
    #[must_use]
    pub fn per_100g(calories: f64, protein: f64, carbs: f64, fat: f64, source: &str) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
            serving: ReferenceServing::Grams(100.0),
            source: source.to_string(),
        }
    }

    /// Number of reference servings an entry with this quantity/weight represents.
    ///
    /// Gram-based facts scale by weight, falling back to one serving per item.
    /// Item-based facts scale by quantity, falling back to a single item.
    #[must_use]
    pub fn servings_for(&self, quantity: Option<f64>, weight: Option<f64>) -> f64 {
        match self.serving {
            ReferenceServing::Grams(g) if g > 0.0 => match (weight, quantity) {
                (Some(w), _) => w / g,
                (None, Some(q)) => q,
                (None, None) => 1.0,
            },
            ReferenceServing::Grams(_) => 1.0,
            ReferenceServing::Item => quantity.unwrap_or(1.0),
        }
    }

    #[must_use]
    pub fn patch_for(&self, entry: &FoodEntry) -> NutritionPatch {
        let factor = self.servings_for(entry.quantity, entry.weight);
        NutritionPatch {
            calories: Some(self.calories * factor),
            protein: Some(self.protein * factor),
            carbs: Some(self.carbs * factor),
            fat: Some(self.fat * factor),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPatch {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl NutritionPatch {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("calories", self.calories)?;
        check_non_negative("protein", self.protein)?;
        check_non_negative("carbs", self.carbs)?;
        check_non_negative("fat", self.fat)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct MacroShare {
    pub protein_pct: f64,
    pub carbs_pct: f64,
    pub fat_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal: MealType,
    pub entries: Vec<FoodEntry>,
    pub subtotal: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub meals: Vec<MealGroup>,
    pub totals: Totals,
    pub water_ml: f64,
    pub water: Vec<WaterEntry>,
    pub goal: DailyGoal,
    /// Fraction of the calorie goal reached, capped at 1.
    pub progress: f64,
    /// Goal minus eaten calories; negative once the goal is exceeded.
    pub remaining_calories: f64,
    pub macro_share: MacroShare,
    pub pending_nutrition: usize,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| Error::validation(format!("invalid date '{s}'. Must be YYYY-MM-DD")))
}

pub(crate) fn check_non_negative(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(Error::validation(format!("{field} must be a number"))),
        Some(v) if v < 0.0 => Err(Error::validation(format!("{field} must not be negative"))),
        _ => Ok(()),
    }
}

pub(crate) fn check_positive(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(Error::validation(format!("{field} must be a number"))),
        Some(v) if v <= 0.0 => Err(Error::validation(format!(
            "{field} must be greater than 0"
        ))),
        _ => Ok(()),
    }
}

/// Validate food input and build the entry it describes.
pub fn validate_food_input(
    input: FoodEntryInput,
    id: EntryId,
    today: NaiveDate,
    created_at: String,
) -> Result<FoodEntry> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(Error::validation("food name must not be empty"));
    }
    if input.quantity.is_none() && input.weight.is_none() {
        return Err(Error::validation("either quantity or weight must be given"));
    }
    check_positive("quantity", input.quantity)?;
    check_positive("weight", input.weight)?;
    check_non_negative("calories", input.calories)?;
    check_non_negative("protein", input.protein)?;
    check_non_negative("carbs", input.carbs)?;
    check_non_negative("fat", input.fat)?;

    Ok(FoodEntry {
        id,
        name: name.to_string(),
        quantity: input.quantity,
        weight: input.weight,
        calories: input.calories,
        protein: input.protein,
        carbs: input.carbs,
        fat: input.fat,
        meal: input.meal,
        date: input.date.unwrap_or(today),
        created_at,
    })
}

pub fn validate_water_input(
    input: &WaterEntryInput,
    id: EntryId,
    today: NaiveDate,
    created_at: String,
) -> Result<WaterEntry> {
    if !input.amount_ml.is_finite() {
        return Err(Error::validation("water amount must be a number"));
    }
    if input.amount_ml <= 0.0 {
        return Err(Error::validation("water amount must be greater than 0"));
    }
    Ok(WaterEntry {
        id,
        amount_ml: input.amount_ml,
        date: input.date.unwrap_or(today),
        created_at,
    })
}

/// Convert a quantity with a unit to grams.
/// Volume-based conversions assume water density (1 ml = 1 g).
/// Returns `(grams, is_approximate)` where `is_approximate` is true for volume conversions.
#[must_use]
pub fn convert_to_grams(quantity: f64, unit: &str) -> Option<(f64, bool)> {
    let lower = unit.to_lowercase();
    match lower.as_str() {
        "g" | "gram" | "grams" => Some((quantity, false)),
        "kg" | "kilogram" | "kilograms" => Some((quantity * 1000.0, false)),
        "lb" | "lbs" | "pound" | "pounds" => Some((quantity * 454.0, false)),
        "oz" | "ounce" | "ounces" => Some((quantity * 28.35, false)),
        "tbsp" | "tablespoon" | "tablespoons" => Some((quantity * 15.0, true)),
        "tsp" | "teaspoon" | "teaspoons" => Some((quantity * 5.0, true)),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
            Some((quantity, true))
        }
        "l" | "liter" | "liters" | "litre" | "litres" => Some((quantity * 1000.0, true)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn egg_input() -> FoodEntryInput {
        FoodEntryInput {
            name: "  Egg ".to_string(),
            quantity: Some(2.0),
            weight: Some(100.0),
            ..FoodEntryInput::default()
        }
    }

    #[test]
    fn test_meal_type_parse_case_insensitive() {
        assert_eq!("Lunch".parse::<MealType>().unwrap(), MealType::Lunch);
        assert_eq!("BREAKFAST".parse::<MealType>().unwrap(), MealType::Breakfast);
        assert_eq!("snacks".parse::<MealType>().unwrap(), MealType::Snack);
        assert!("brunch".parse::<MealType>().is_err());
        assert!("".parse::<MealType>().is_err());
    }

    #[test]
    fn test_entry_id_round_trips_through_display() {
        let id = EntryId::new();
        assert_eq!(id.to_string().parse::<EntryId>().unwrap(), id);
        assert!("not-an-id".parse::<EntryId>().is_err());
    }

    #[test]
    fn test_validate_food_trims_name_and_defaults_date() {
        let entry =
            validate_food_input(egg_input(), EntryId::new(), day(), String::new()).unwrap();
        assert_eq!(entry.name, "Egg");
        assert_eq!(entry.date, day());
        assert_eq!(entry.meal, MealType::Snack);
        assert!(entry.calories.is_none());
        assert!(entry.needs_nutrition());
    }

    #[test]
    fn test_validate_food_empty_name() {
        let input = FoodEntryInput {
            name: "   ".to_string(),
            ..egg_input()
        };
        assert!(matches!(
            validate_food_input(input, EntryId::new(), day(), String::new()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_validate_food_needs_quantity_or_weight() {
        let input = FoodEntryInput {
            quantity: None,
            weight: None,
            ..egg_input()
        };
        assert!(validate_food_input(input, EntryId::new(), day(), String::new()).is_err());

        let weight_only = FoodEntryInput {
            quantity: None,
            ..egg_input()
        };
        assert!(validate_food_input(weight_only, EntryId::new(), day(), String::new()).is_ok());
    }

    #[test]
    fn test_validate_food_rejects_bad_numbers() {
        for input in [
            FoodEntryInput {
                quantity: Some(0.0),
                ..egg_input()
            },
            FoodEntryInput {
                weight: Some(-5.0),
                ..egg_input()
            },
            FoodEntryInput {
                calories: Some(-1.0),
                ..egg_input()
            },
            FoodEntryInput {
                fat: Some(f64::NAN),
                ..egg_input()
            },
        ] {
            assert!(validate_food_input(input, EntryId::new(), day(), String::new()).is_err());
        }
    }

    #[test]
    fn test_validate_water() {
        let ok = WaterEntryInput {
            amount_ml: 250.0,
            date: None,
        };
        let entry = validate_water_input(&ok, EntryId::new(), day(), String::new()).unwrap();
        assert_eq!(entry.date, day());

        for amount_ml in [0.0, -100.0, f64::INFINITY] {
            let bad = WaterEntryInput {
                amount_ml,
                date: None,
            };
            assert!(validate_water_input(&bad, EntryId::new(), day(), String::new()).is_err());
        }
    }

    #[test]
    fn test_daily_goal_must_be_positive() {
        assert!(DailyGoal::new(1800.0).is_ok());
        assert!(matches!(DailyGoal::new(0.0), Err(Error::Config(_))));
        assert!(matches!(DailyGoal::new(-10.0), Err(Error::Config(_))));
        assert!((DailyGoal::default().calorie_goal - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_patch_only_fills_missing() {
        let mut entry = validate_food_input(
            FoodEntryInput {
                calories: Some(90.0),
                ..egg_input()
            },
            EntryId::new(),
            day(),
            String::new(),
        )
        .unwrap();
        let patch = NutritionPatch {
            calories: Some(155.0),
            protein: Some(13.0),
            carbs: None,
            fat: Some(11.0),
        };
        assert!(entry.apply_patch(&patch));
        assert_eq!(entry.calories, Some(90.0));
        assert_eq!(entry.protein, Some(13.0));
        assert!(entry.carbs.is_none());
        assert_eq!(entry.fat, Some(11.0));

        // Applying the same patch again changes nothing
        assert!(!entry.apply_patch(&patch));
    }

    #[test]
    fn test_servings_for_gram_reference() {
        let facts = NutritionFacts::per_100g(155.0, 13.0, 1.1, 11.0, "test");
        assert!((facts.servings_for(Some(2.0), Some(100.0)) - 1.0).abs() < f64::EPSILON);
        assert!((facts.servings_for(None, Some(250.0)) - 2.5).abs() < f64::EPSILON);
        assert!((facts.servings_for(Some(3.0), None) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_servings_for_item_reference() {
        let facts = NutritionFacts {
            serving: ReferenceServing::Item,
            ..NutritionFacts::per_100g(95.0, 0.5, 25.0, 0.3, "test")
        };
        assert!((facts.servings_for(Some(2.0), Some(400.0)) - 2.0).abs() < f64::EPSILON);
        assert!((facts.servings_for(None, Some(400.0)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-06-15").unwrap(), day());
        assert!(parse_date("15/06/2024").is_err());
    }

    #[test]
    fn test_convert_to_grams_weight_units() {
        let (g, approx) = convert_to_grams(2.0, "kg").unwrap();
        assert!((g - 2000.0).abs() < f64::EPSILON);
        assert!(!approx);

        let (g, _) = convert_to_grams(1.0, "oz").unwrap();
        assert!((g - 28.35).abs() < f64::EPSILON);
    }

    #[test]
    fn test_convert_to_grams_volume_units() {
        let (g, approx) = convert_to_grams(1.0, "tbsp").unwrap();
        assert!((g - 15.0).abs() < f64::EPSILON);
        assert!(approx);

        let (g, _) = convert_to_grams(1.0, "L").unwrap();
        assert!((g - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_convert_to_grams_unknown_unit() {
        assert!(convert_to_grams(1.0, "cup").is_none());
        assert!(convert_to_grams(1.0, "").is_none());
    }
}

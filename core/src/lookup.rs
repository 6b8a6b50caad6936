use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NutritionFacts, ReferenceServing};

/// Source of nutrition facts for a food name.
///
/// `Ok(None)` means the source answered and does not know the food.
/// A source that could not answer at all returns `Error::LookupUnavailable`.
#[async_trait]
pub trait NutritionLookup: Send + Sync {
    async fn fetch(&self, food_name: &str) -> Result<Option<NutritionFacts>>;
}

const STATIC_SOURCE: &str = "builtin";

// name, calories, protein, carbs, fat, per item (false = per 100 g)
type Row = (&'static str, f64, f64, f64, f64, bool);

const COMMON_FOODS: &[Row] = &[
    ("Apple", 95.0, 0.5, 25.0, 0.3, true),
    ("Banana", 105.0, 1.3, 27.0, 0.4, true),
    ("Orange", 62.0, 1.2, 15.4, 0.2, true),
    ("Mango", 150.0, 2.0, 37.0, 0.6, true),
    ("Pear", 100.0, 0.6, 27.0, 0.2, true),
    ("Peach", 59.0, 1.4, 14.0, 0.4, true),
    ("Avocado", 240.0, 3.0, 12.8, 22.0, true),
    ("Kiwi", 42.0, 0.8, 10.1, 0.4, true),
    ("Hard-boiled Egg", 78.0, 6.3, 0.6, 5.3, true),
    ("Egg", 155.0, 13.0, 1.1, 11.0, false),
    ("Broccoli", 34.0, 2.8, 6.6, 0.4, false),
    ("Carrot", 41.0, 0.9, 9.6, 0.2, false),
    ("Spinach", 23.0, 2.9, 3.6, 0.4, false),
    ("Tomato", 18.0, 0.9, 3.9, 0.2, false),
    ("Potato (boiled)", 87.0, 1.9, 20.1, 0.1, false),
    ("Rice", 130.0, 2.7, 28.2, 0.3, false),
    ("Pasta (cooked)", 131.0, 5.0, 25.0, 1.1, false),
    ("Whole Wheat Bread", 260.0, 13.0, 43.0, 3.4, false),
    ("Oatmeal (cooked)", 68.0, 2.4, 12.0, 1.4, false),
    ("Lentils (cooked)", 116.0, 9.0, 20.0, 0.4, false),
    ("Chicken Breast (cooked, skinless)", 165.0, 31.0, 0.0, 3.6, false),
    ("Salmon (cooked)", 208.0, 20.0, 0.0, 13.0, false),
    ("Tofu (firm)", 76.0, 8.0, 1.9, 4.8, false),
    ("Milk (2% fat)", 50.0, 3.3, 4.8, 2.0, false),
    ("Plain Greek Yogurt (0% fat)", 59.0, 10.0, 3.6, 0.4, false),
    ("Cheddar Cheese", 403.0, 25.0, 1.3, 33.0, false),
    ("Almonds", 579.0, 21.0, 22.0, 50.0, false),
    ("Peanut Butter", 588.0, 25.0, 20.0, 50.0, false),
    ("Olive Oil", 884.0, 0.0, 0.0, 100.0, false),
];

/// Built-in table of common foods, matched by exact name ignoring case.
pub struct StaticTable {
    foods: HashMap<String, NutritionFacts>,
}

impl StaticTable {
    #[must_use]
    pub fn new() -> Self {
        Self::from_facts(COMMON_FOODS.iter().map(|&(name, cal, p, c, f, per_item)| {
            let facts = if per_item {
                NutritionFacts {
                    serving: ReferenceServing::Item,
                    ..NutritionFacts::per_100g(cal, p, c, f, STATIC_SOURCE)
                }
            } else {
                NutritionFacts::per_100g(cal, p, c, f, STATIC_SOURCE)
            };
            (name.to_string(), facts)
        }))
    }

    pub fn from_facts(entries: impl IntoIterator<Item = (String, NutritionFacts)>) -> Self {
        let foods = entries
            .into_iter()
            .map(|(name, facts)| (normalize(&name), facts))
            .collect();
        Self { foods }
    }

    #[must_use]
    pub fn get(&self, food_name: &str) -> Option<&NutritionFacts> {
        self.foods.get(&normalize(food_name))
    }

    /// Known names, sorted, in display case.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = COMMON_FOODS.iter().map(|row| row.0).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.foods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }
}

impl Default for StaticTable {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[async_trait]
impl NutritionLookup for StaticTable {
    async fn fetch(&self, food_name: &str) -> Result<Option<NutritionFacts>> {
        Ok(self.get(food_name).cloned())
    }
}

/// Ask `primary` first and fall back to `secondary`.
///
/// Unavailable is only reported when neither source knew the food and at
/// least one of them could not be reached.
pub struct Chained {
    primary: Arc<dyn NutritionLookup>,
    secondary: Arc<dyn NutritionLookup>,
}

impl Chained {
    pub fn new(primary: Arc<dyn NutritionLookup>, secondary: Arc<dyn NutritionLookup>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl NutritionLookup for Chained {
    async fn fetch(&self, food_name: &str) -> Result<Option<NutritionFacts>> {
        let mut unavailable = None;

        for source in [&self.primary, &self.secondary] {
            match source.fetch(food_name).await {
                Ok(Some(facts)) => return Ok(Some(facts)),
                Ok(None) => {}
                Err(Error::LookupUnavailable(reason)) => {
                    debug!(food = food_name, %reason, "lookup source unavailable, trying next");
                    unavailable.get_or_insert(reason);
                }
                Err(e) => return Err(e),
            }
        }

        match unavailable {
            Some(reason) => Err(Error::LookupUnavailable(reason)),
            None => Ok(None),
        }
    }
}

use serde::Deserialize;

use crate::models::NutritionFacts;

pub const SOURCE: &str = "openfoodfacts";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub products: Vec<ProductData>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fat_100g: Option<f64>,
}

/// Per-100g facts for a product. Products without a name or calories are
/// skipped; a missing macro counts as 0.
#[must_use]
pub fn product_to_facts(p: &ProductData) -> Option<NutritionFacts> {
    p.product_name.as_deref().filter(|n| !n.trim().is_empty())?;
    let n = p.nutriments.as_ref()?;
    let calories = n.energy_kcal_100g.filter(|c| c.is_finite() && *c >= 0.0)?;
    let macro_or_zero = |v: Option<f64>| v.filter(|g| g.is_finite() && *g >= 0.0).unwrap_or(0.0);

    Some(NutritionFacts::per_100g(
        calories,
        macro_or_zero(n.proteins_100g),
        macro_or_zero(n.carbohydrates_100g),
        macro_or_zero(n.fat_100g),
        SOURCE,
    ))
}

/// Facts for the product that best matches `query`: an exact name match
/// (ignoring case) wins, otherwise the first usable product.
#[must_use]
pub fn best_match(response: &SearchResponse, query: &str) -> Option<NutritionFacts> {
    let query = query.trim();
    let exact = response.products.iter().find(|p| {
        p.product_name
            .as_deref()
            .is_some_and(|name| name.trim().eq_ignore_ascii_case(query))
    });
    exact
        .and_then(product_to_facts)
        .or_else(|| response.products.iter().find_map(product_to_facts))
}

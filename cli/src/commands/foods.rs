use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use kcal_core::lookup::StaticTable;
use kcal_core::models::{NutritionFacts, ReferenceServing};

use super::helpers::truncate;

/// List the built-in food table, optionally filtered by a name fragment.
pub(crate) fn cmd_foods(search: Option<&str>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Per")]
        per: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let table = StaticTable::new();
    let needle = search.map(str::to_lowercase);
    let foods: Vec<(&str, &NutritionFacts)> = StaticTable::names()
        .into_iter()
        .filter(|name| {
            needle
                .as_deref()
                .is_none_or(|n| name.to_lowercase().contains(n))
        })
        .filter_map(|name| table.get(name).map(|facts| (name, facts)))
        .collect();

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No foods found");
        }
        process::exit(2);
    }

    if json {
        let list: Vec<serde_json::Value> = foods
            .iter()
            .map(|(name, facts)| serde_json::json!({ "name": name, "facts": facts }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|(name, f)| FoodRow {
            name: truncate(name, 35),
            per: match f.serving {
                ReferenceServing::Grams(g) => format!("{g:.0}g"),
                ReferenceServing::Item => "item".to_string(),
            },
            calories: format!("{:.0}", f.calories),
            protein: format!("{:.1}", f.protein),
            carbs: format!("{:.1}", f.carbs),
            fat: format!("{:.1}", f.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

use anyhow::{Context, Result};
use async_trait::async_trait;

use kcal_core::error::Error;
use kcal_core::lookup::NutritionLookup;
use kcal_core::models::NutritionFacts;
use kcal_core::openfoodfacts::{SearchResponse, best_match};

const SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
}

impl OpenFoodFactsClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "kcal-cli/{} (nutrition log)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(8))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub async fn search_async(&self, query: &str) -> Result<SearchResponse> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[("search_terms", query), ("json", "1"), ("page_size", "10")])
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?
            .error_for_status()
            .context("OpenFoodFacts API returned an error")?;

        resp.json()
            .await
            .context("Failed to parse OpenFoodFacts search response")
    }
}

#[async_trait]
impl NutritionLookup for OpenFoodFactsClient {
    async fn fetch(&self, food_name: &str) -> kcal_core::Result<Option<NutritionFacts>> {
        let response = self
            .search_async(food_name)
            .await
            .map_err(|e| Error::LookupUnavailable(format!("{e:#}")))?;
        Ok(best_match(&response, food_name))
    }
}

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use tracing::info;

use crate::aggregate;
use crate::backfill::{BackfillHandle, Backfiller};
use crate::csv_io::{self, CsvRow, ImportSummary};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::lookup::NutritionLookup;
use crate::models::{
    DailyGoal, DailySummary, EntryId, FoodEntry, FoodEntryInput, NutritionPatch, WaterEntry,
    WaterEntryInput,
};
use crate::persistence::{MemoryPersistence, PersistenceAdapter};
use crate::store::EntryStore;

pub const CALORIE_GOAL_KEY: &str = "calorie_goal";

/// Entry point for front ends: owns the store, the nutrition lookup and the
/// backfill tasks.
///
/// Adding a food never waits for nutrition. Entries with unknown values are
/// backfilled in the background when a tokio runtime is available.
pub struct Tracker {
    store: Arc<EntryStore>,
    backfill: Backfiller,
}

impl Tracker {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>, lookup: Arc<dyn NutritionLookup>) -> Self {
        let store = Arc::new(EntryStore::new(persistence));
        let backfill = Backfiller::new(Arc::clone(&store), lookup);
        Self { store, backfill }
    }

    pub fn open(db_path: &Path, lookup: Arc<dyn NutritionLookup>) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::new(Arc::new(db), lookup))
    }

    pub fn new_in_memory(lookup: Arc<dyn NutritionLookup>) -> Self {
        Self::new(Arc::new(MemoryPersistence::new()), lookup)
    }

    #[must_use]
    pub fn with_lookup_timeout(self, timeout: Duration) -> Self {
        let Self { store, backfill } = self;
        Self {
            store,
            backfill: backfill.with_timeout(timeout),
        }
    }

    #[must_use]
    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    // --- Foods ---

    pub fn add_food(&self, input: FoodEntryInput) -> Result<FoodEntry> {
        Ok(self.add_food_with_backfill(input)?.0)
    }

    /// Like [`Tracker::add_food`], also handing back the scheduled backfill
    /// so the caller can wait for its outcome.
    pub fn add_food_with_backfill(
        &self,
        input: FoodEntryInput,
    ) -> Result<(FoodEntry, Option<BackfillHandle>)> {
        let entry = self.store.add_food(input)?;
        let handle = self.backfill.schedule(&entry);
        Ok((entry, handle))
    }

    /// Remove a food entry and cancel its pending backfill.
    pub fn remove_food(&self, id: EntryId) -> Result<bool> {
        let removed = self.store.remove_food(id)?;
        if removed {
            self.backfill.cancel(id);
        }
        Ok(removed)
    }

    pub fn update_food(&self, id: EntryId, patch: &NutritionPatch) -> Result<FoodEntry> {
        self.store.update_food(id, patch)
    }

    pub fn get_food(&self, id: EntryId) -> Result<FoodEntry> {
        self.store.get_food(id)
    }

    pub fn list_by_date(&self, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        self.store.list_by_date(date)
    }

    // --- Water ---

    pub fn add_water(&self, input: &WaterEntryInput) -> Result<WaterEntry> {
        self.store.add_water(input)
    }

    pub fn remove_water(&self, id: EntryId) -> Result<bool> {
        self.store.remove_water(id)
    }

    pub fn list_water_by_date(&self, date: NaiveDate) -> Result<Vec<WaterEntry>> {
        self.store.list_water_by_date(date)
    }

    /// Remove a food or water entry, whichever holds `id`.
    pub fn remove_entry(&self, id: EntryId) -> Result<bool> {
        if self.remove_food(id)? {
            return Ok(true);
        }
        self.store.remove_water(id)
    }

    // --- Summaries ---

    pub fn summary(&self, date: NaiveDate) -> Result<DailySummary> {
        let log = self.store.day_log(date)?;
        aggregate::build_daily_summary(date, log.foods, log.water, self.goal()?)
    }

    /// Summaries for the `days` days ending at `end`, newest first.
    pub fn history(&self, end: NaiveDate, days: u64) -> Result<Vec<DailySummary>> {
        let goal = self.goal()?;
        (0..days)
            .filter_map(|i| end.checked_sub_days(Days::new(i)))
            .map(|date| {
                let log = self.store.day_log(date)?;
                aggregate::build_daily_summary(date, log.foods, log.water, goal)
            })
            .collect()
    }

    // --- Calorie goal ---

    pub fn goal(&self) -> Result<DailyGoal> {
        match self.store.persistence().get_setting(CALORIE_GOAL_KEY)? {
            Some(v) => {
                let calories = v.parse::<f64>().map_err(|_| {
                    Error::Config(format!("stored calorie goal '{v}' is not a number"))
                })?;
                DailyGoal::new(calories)
            }
            None => Ok(DailyGoal::default()),
        }
    }

    pub fn set_goal(&self, calories: f64) -> Result<DailyGoal> {
        let goal = DailyGoal::new(calories)?;
        self.store
            .persistence()
            .set_setting(CALORIE_GOAL_KEY, &calories.to_string())?;
        info!(calories, "calorie goal set");
        Ok(goal)
    }

    /// Forget the configured goal and fall back to the default.
    pub fn clear_goal(&self) -> Result<bool> {
        Ok(self.store.persistence().delete_setting(CALORIE_GOAL_KEY)?)
    }

    // --- Backfill ---

    /// Schedule backfill for every entry on `date` still missing nutrition.
    pub fn retry_backfill(&self, date: NaiveDate) -> Result<Vec<BackfillHandle>> {
        Ok(self
            .store
            .list_by_date(date)?
            .iter()
            .filter_map(|e| self.backfill.schedule(e))
            .collect())
    }

    /// Wait for every backfill running now. Returns how many there were.
    pub async fn wait_for_all_backfills(&self) -> usize {
        self.backfill.wait_all().await
    }

    #[must_use]
    pub fn pending_backfills(&self) -> usize {
        self.backfill.pending()
    }

    // --- Export / Import ---

    /// Write every stored entry as CSV. Returns the number of rows written.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let dates = self.store.persistence().dates()?;
        let logs = dates
            .into_iter()
            .map(|date| Ok::<_, Error>((date, self.store.day_log(date)?)))
            .collect::<Result<Vec<_>>>()?;
        csv_io::write_csv(writer, &logs)
    }

    /// Import a CSV export. The whole file is validated before anything is added.
    pub fn import_csv<R: Read>(&self, reader: R) -> Result<ImportSummary> {
        let rows = csv_io::parse_csv(reader)?;
        let mut summary = ImportSummary {
            rows_parsed: rows.len(),
            ..ImportSummary::default()
        };
        let mut dates = HashSet::new();

        for row in rows {
            match row {
                CsvRow::Food(input) => {
                    let entry = self.add_food(input)?;
                    dates.insert(entry.date);
                    summary.foods_imported += 1;
                }
                CsvRow::Water(input) => {
                    let entry = self.add_water(&input)?;
                    dates.insert(entry.date);
                    summary.water_imported += 1;
                }
            }
        }

        summary.dates_spanned = dates.len();
        info!(
            foods = summary.foods_imported,
            water = summary.water_imported,
            "csv import finished"
        );
        Ok(summary)
    }
}

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::models::{DATE_FORMAT, DayLog, EntryId};

/// Durable storage of day logs, keyed by ISO calendar date.
///
/// Implementations only need load-after-save consistency within one process;
/// loading a date that was never saved returns an empty log.
pub trait PersistenceAdapter: Send + Sync {
    /// Replace everything stored for `date` with `log`.
    fn save(&self, date: NaiveDate, log: &DayLog) -> Result<()>;

    fn load(&self, date: NaiveDate) -> Result<DayLog>;

    /// Find the date holding a food or water entry that is not loaded yet.
    fn locate(&self, _id: &EntryId) -> Result<Option<NaiveDate>> {
        Ok(None)
    }

    /// Dates with at least one stored entry, ascending.
    fn dates(&self) -> Result<Vec<NaiveDate>>;

    fn get_setting(&self, key: &str) -> Result<Option<String>>;

    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn delete_setting(&self, key: &str) -> Result<bool>;
}

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPersistence {
    days: Mutex<BTreeMap<String, DayLog>>,
    settings: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceAdapter for MemoryPersistence {
    fn save(&self, date: NaiveDate, log: &DayLog) -> Result<()> {
        let mut days = self.days.lock();
        if log.is_empty() {
            days.remove(&date_key(date));
        } else {
            days.insert(date_key(date), log.clone());
        }
        Ok(())
    }

    fn load(&self, date: NaiveDate) -> Result<DayLog> {
        Ok(self
            .days
            .lock()
            .get(&date_key(date))
            .cloned()
            .unwrap_or_default())
    }

    fn locate(&self, id: &EntryId) -> Result<Option<NaiveDate>> {
        let days = self.days.lock();
        let found = days.values().find_map(|log| {
            log.foods
                .iter()
                .find(|f| f.id == *id)
                .map(|f| f.date)
                .or_else(|| log.water.iter().find(|w| w.id == *id).map(|w| w.date))
        });
        Ok(found)
    }

    fn dates(&self) -> Result<Vec<NaiveDate>> {
        let days = self.days.lock();
        days.keys()
            .map(|k| Ok(NaiveDate::parse_from_str(k, DATE_FORMAT)?))
            .collect()
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.settings.lock().get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.settings
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<bool> {
        Ok(self.settings.lock().remove(key).is_some())
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{
    DayLog, EntryId, FoodEntry, FoodEntryInput, NutritionPatch, WaterEntry, WaterEntryInput,
    validate_food_input, validate_water_input,
};
use crate::persistence::PersistenceAdapter;

type Bucket = Arc<RwLock<DayLog>>;

enum Change<T> {
    Unchanged(T),
    Changed(T),
}

pub struct EntryStore {
    persistence: Arc<dyn PersistenceAdapter>,
    buckets: RwLock<HashMap<NaiveDate, Bucket>>,
    index: RwLock<HashMap<EntryId, NaiveDate>>,
}

impl EntryStore {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            persistence,
            buckets: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn persistence(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.persistence
    }

    // --- Foods ---

    pub fn add_food(&self, input: FoodEntryInput) -> Result<FoodEntry> {
        let entry = validate_food_input(input, EntryId::new(), today(), now())?;
        let stored = entry.clone();
        self.commit(entry.date, move |log| {
            log.foods.push(entry);
            Ok(Change::Changed(()))
        })?;
        self.index.write().insert(stored.id, stored.date);
        debug!(id = %stored.id, date = %stored.date, name = %stored.name, "food added");
        Ok(stored)
    }

    /// Remove a food entry. Removing an unknown id is a no-op returning `false`.
    pub fn remove_food(&self, id: EntryId) -> Result<bool> {
        let Some(date) = self.locate(&id)? else {
            return Ok(false);
        };
        let removed = self.commit(date, |log| {
            Ok(match log.foods.iter().position(|f| f.id == id) {
                Some(pos) => {
                    log.foods.remove(pos);
                    Change::Changed(true)
                }
                None => Change::Unchanged(false),
            })
        })?;
        if removed {
            self.index.write().remove(&id);
            debug!(%id, %date, "food removed");
        }
        Ok(removed)
    }

    /// Fill nutrition fields that are still unknown. Known values are never overwritten.
    pub fn update_food(&self, id: EntryId, patch: &NutritionPatch) -> Result<FoodEntry> {
        patch.validate()?;
        let date = self.locate(&id)?.ok_or(Error::NotFound(id))?;
        self.commit(date, |log| {
            let entry = log
                .foods
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or(Error::NotFound(id))?;
            if entry.apply_patch(patch) {
                Ok(Change::Changed(entry.clone()))
            } else {
                Ok(Change::Unchanged(entry.clone()))
            }
        })
    }

    pub fn get_food(&self, id: EntryId) -> Result<FoodEntry> {
        let date = self.locate(&id)?.ok_or(Error::NotFound(id))?;
        let bucket = self.bucket(date)?;
        let log = bucket.read();
        log.foods
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Food entries for `date` in insertion order.
    pub fn list_by_date(&self, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        Ok(self.bucket(date)?.read().foods.clone())
    }

    // --- Water ---

    pub fn add_water(&self, input: &WaterEntryInput) -> Result<WaterEntry> {
        let entry = validate_water_input(input, EntryId::new(), today(), now())?;
        let stored = entry.clone();
        self.commit(entry.date, move |log| {
            log.water.push(entry);
            Ok(Change::Changed(()))
        })?;
        self.index.write().insert(stored.id, stored.date);
        debug!(id = %stored.id, date = %stored.date, amount_ml = stored.amount_ml, "water added");
        Ok(stored)
    }

    /// Remove a water entry. Removing an unknown id is a no-op returning `false`.
    pub fn remove_water(&self, id: EntryId) -> Result<bool> {
        let Some(date) = self.locate(&id)? else {
            return Ok(false);
        };
        let removed = self.commit(date, |log| {
            Ok(match log.water.iter().position(|w| w.id == id) {
                Some(pos) => {
                    log.water.remove(pos);
                    Change::Changed(true)
                }
                None => Change::Unchanged(false),
            })
        })?;
        if removed {
            self.index.write().remove(&id);
            debug!(%id, %date, "water removed");
        }
        Ok(removed)
    }

    pub fn list_water_by_date(&self, date: NaiveDate) -> Result<Vec<WaterEntry>> {
        Ok(self.bucket(date)?.read().water.clone())
    }

    /// Foods and water for `date`, taken from one consistent snapshot.
    pub fn day_log(&self, date: NaiveDate) -> Result<DayLog> {
        Ok(self.bucket(date)?.read().clone())
    }

    // --- Internals ---

    fn bucket(&self, date: NaiveDate) -> Result<Bucket> {
        if let Some(bucket) = self.buckets.read().get(&date) {
            return Ok(Arc::clone(bucket));
        }

        let loaded = self.persistence.load(date)?;
        let mut buckets = self.buckets.write();
        // Another caller may have loaded this date while we were reading.
        let bucket = buckets.entry(date).or_insert_with(|| {
            let mut index = self.index.write();
            for f in &loaded.foods {
                index.insert(f.id, date);
            }
            for w in &loaded.water {
                index.insert(w.id, date);
            }
            Arc::new(RwLock::new(loaded))
        });
        Ok(Arc::clone(bucket))
    }

    fn locate(&self, id: &EntryId) -> Result<Option<NaiveDate>> {
        if let Some(date) = self.index.read().get(id) {
            return Ok(Some(*date));
        }
        let Some(date) = self.persistence.locate(id)? else {
            return Ok(None);
        };
        // Loading the bucket indexes its entries.
        self.bucket(date)?;
        Ok(Some(date))
    }

    fn commit<T>(
        &self,
        date: NaiveDate,
        op: impl FnOnce(&mut DayLog) -> Result<Change<T>>,
    ) -> Result<T> {
        let bucket = self.bucket(date)?;
        let mut log = bucket.write();
        let snapshot = log.clone();

        match op(&mut log) {
            Ok(Change::Unchanged(value)) => Ok(value),
            Ok(Change::Changed(value)) => {
                if let Err(e) = self.persistence.save(date, &log) {
                    warn!(%date, error = %e, "failed to persist entries, rolling back");
                    *log = snapshot;
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                *log = snapshot;
                Err(e)
            }
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn now() -> String {
    Local::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;
    use crate::persistence::MemoryPersistence;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn memory_store() -> EntryStore {
        EntryStore::new(Arc::new(MemoryPersistence::new()))
    }

    fn food(name: &str, date: NaiveDate) -> FoodEntryInput {
        FoodEntryInput {
            name: name.to_string(),
            quantity: Some(1.0),
            date: Some(date),
            ..FoodEntryInput::default()
        }
    }

    /// Persistence that can be switched to fail every save.
    #[derive(Default)]
    struct FlakyPersistence {
        inner: MemoryPersistence,
        failing: AtomicBool,
    }

    impl PersistenceAdapter for FlakyPersistence {
        fn save(&self, date: NaiveDate, log: &DayLog) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.save(date, log)
        }

        fn load(&self, date: NaiveDate) -> anyhow::Result<DayLog> {
            self.inner.load(date)
        }

        fn locate(&self, id: &EntryId) -> anyhow::Result<Option<NaiveDate>> {
            self.inner.locate(id)
        }

        fn dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
            self.inner.dates()
        }

        fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.inner.get_setting(key)
        }

        fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.set_setting(key, value)
        }

        fn delete_setting(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.delete_setting(key)
        }
    }

    #[test]
    fn test_add_defaults_to_today() {
        let store = memory_store();
        let entry = store
            .add_food(FoodEntryInput {
                date: None,
                ..food("Apple", day(1))
            })
            .unwrap();
        assert_eq!(entry.date, Local::now().date_naive());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = memory_store();
        for name in ["Oats", "Banana", "Coffee"] {
            store.add_food(food(name, day(15))).unwrap();
        }
        let names: Vec<String> = store
            .list_by_date(day(15))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Oats", "Banana", "Coffee"]);
    }

    #[test]
    fn test_list_unknown_date_is_empty() {
        let store = memory_store();
        assert!(store.list_by_date(day(20)).unwrap().is_empty());
        assert!(store.list_water_by_date(day(20)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_add_leaves_store_unchanged() {
        let store = memory_store();
        store.add_food(food("Rice", day(15))).unwrap();

        let err = store
            .add_food(FoodEntryInput {
                name: String::new(),
                ..food("", day(15))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = store
            .add_food(FoodEntryInput {
                quantity: None,
                weight: None,
                ..food("Rice", day(15))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert_eq!(store.list_by_date(day(15)).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let store = memory_store();
        let keep = store.add_food(food("Keep", day(15))).unwrap();
        let gone = store.add_food(food("Gone", day(15))).unwrap();

        assert!(store.remove_food(gone.id).unwrap());
        let before = store.list_by_date(day(15)).unwrap();
        assert!(!store.remove_food(gone.id).unwrap());
        assert_eq!(store.list_by_date(day(15)).unwrap(), before);
        assert_eq!(before, vec![keep]);
    }

    #[test]
    fn test_remove_by_identity_not_position() {
        let store = memory_store();
        let a = store.add_food(food("A", day(15))).unwrap();
        let b = store.add_food(food("B", day(15))).unwrap();
        let c = store.add_food(food("C", day(15))).unwrap();

        store.remove_food(a.id).unwrap();
        // b now sits at index 0, c at index 1; removal by id still hits c
        store.remove_food(c.id).unwrap();
        assert_eq!(store.list_by_date(day(15)).unwrap(), vec![b]);
    }

    #[test]
    fn test_update_fills_missing_fields_only() {
        let store = memory_store();
        let entry = store
            .add_food(FoodEntryInput {
                calories: Some(100.0),
                ..food("Yogurt", day(15))
            })
            .unwrap();

        let patch = NutritionPatch {
            calories: Some(59.0),
            protein: Some(10.0),
            carbs: Some(3.6),
            fat: None,
        };
        let updated = store.update_food(entry.id, &patch).unwrap();
        assert_eq!(updated.calories, Some(100.0));
        assert_eq!(updated.protein, Some(10.0));
        assert_eq!(updated.carbs, Some(3.6));
        assert!(updated.fat.is_none());
        assert_eq!(store.get_food(entry.id).unwrap(), updated);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = memory_store();
        let err = store
            .update_food(EntryId::new(), &NutritionPatch::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_update_after_remove_does_not_resurrect() {
        let store = memory_store();
        let entry = store.add_food(food("Toast", day(15))).unwrap();
        store.remove_food(entry.id).unwrap();

        let patch = NutritionPatch {
            calories: Some(80.0),
            ..NutritionPatch::default()
        };
        assert!(matches!(
            store.update_food(entry.id, &patch),
            Err(Error::NotFound(_))
        ));
        assert!(store.list_by_date(day(15)).unwrap().is_empty());
    }

    #[test]
    fn test_update_rejects_negative_patch() {
        let store = memory_store();
        let entry = store.add_food(food("Toast", day(15))).unwrap();
        let patch = NutritionPatch {
            fat: Some(-1.0),
            ..NutritionPatch::default()
        };
        assert!(matches!(
            store.update_food(entry.id, &patch),
            Err(Error::Validation(_))
        ));
        assert!(store.get_food(entry.id).unwrap().fat.is_none());
    }

    #[test]
    fn test_water_parallel_contract() {
        let store = memory_store();
        let w1 = store
            .add_water(&WaterEntryInput {
                amount_ml: 250.0,
                date: Some(day(15)),
            })
            .unwrap();
        let w2 = store
            .add_water(&WaterEntryInput {
                amount_ml: 500.0,
                date: Some(day(15)),
            })
            .unwrap();
        assert!(
            store
                .add_water(&WaterEntryInput {
                    amount_ml: 0.0,
                    date: Some(day(15)),
                })
                .is_err()
        );

        assert_eq!(
            store.list_water_by_date(day(15)).unwrap(),
            vec![w1.clone(), w2.clone()]
        );
        assert!(store.remove_water(w1.id).unwrap());
        assert!(!store.remove_water(w1.id).unwrap());
        assert_eq!(store.list_water_by_date(day(15)).unwrap(), vec![w2]);
    }

    #[test]
    fn test_food_and_water_ids_do_not_cross() {
        let store = memory_store();
        let f = store.add_food(food("Tea", day(15))).unwrap();
        let w = store
            .add_water(&WaterEntryInput {
                amount_ml: 200.0,
                date: Some(day(15)),
            })
            .unwrap();

        assert!(!store.remove_water(f.id).unwrap());
        assert!(!store.remove_food(w.id).unwrap());
        assert_eq!(store.day_log(day(15)).unwrap().foods.len(), 1);
        assert_eq!(store.day_log(day(15)).unwrap().water.len(), 1);
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let persistence = Arc::new(FlakyPersistence::default());
        let store = EntryStore::new(persistence.clone());
        let kept = store.add_food(food("Kept", day(15))).unwrap();

        persistence.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.add_food(food("Lost", day(15))),
            Err(Error::Storage(_))
        ));
        assert!(matches!(
            store.remove_food(kept.id),
            Err(Error::Storage(_))
        ));
        assert_eq!(store.list_by_date(day(15)).unwrap(), vec![kept.clone()]);

        persistence.failing.store(false, Ordering::SeqCst);
        assert!(store.remove_food(kept.id).unwrap());
    }

    #[test]
    fn test_writes_through_and_reloads_in_new_store() {
        let persistence: Arc<dyn PersistenceAdapter> = Arc::new(MemoryPersistence::new());
        let first = EntryStore::new(Arc::clone(&persistence));
        let egg = first.add_food(food("Egg", day(15))).unwrap();
        let toast = first.add_food(food("Toast", day(16))).unwrap();

        let second = EntryStore::new(persistence);
        assert_eq!(second.list_by_date(day(15)).unwrap(), vec![egg]);
        // Never-listed date: id is resolved through the adapter
        assert_eq!(second.get_food(toast.id).unwrap(), toast);
        assert!(second.remove_food(toast.id).unwrap());
        assert!(second.list_by_date(day(16)).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let store = memory_store();
        std::thread::scope(|s| {
            for t in 0..4 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..25 {
                        store.add_food(food(&format!("f{t}-{i}"), day(15))).unwrap();
                        store.add_food(food(&format!("g{t}-{i}"), day(16))).unwrap();
                    }
                });
            }
        });
        assert_eq!(store.list_by_date(day(15)).unwrap().len(), 100);
        assert_eq!(store.list_by_date(day(16)).unwrap().len(), 100);
    }

    fn opt_amount(max: f64) -> impl Strategy<Value = Option<f64>> {
        prop::option::of(0.0..max)
    }

    fn arb_food_input() -> impl Strategy<Value = FoodEntryInput> {
        (
            "[A-Za-z][A-Za-z ]{0,20}",
            prop::option::of(0.1..20.0f64),
            prop::option::of(1.0..2000.0f64),
            opt_amount(5000.0),
            opt_amount(300.0),
            opt_amount(300.0),
            opt_amount(300.0),
            prop::sample::select(MealType::ALL.to_vec()),
            1u32..=28,
        )
            .prop_filter("quantity or weight", |(_, q, w, ..)| q.is_some() || w.is_some())
            .prop_map(
                |(name, quantity, weight, calories, protein, carbs, fat, meal, d)| FoodEntryInput {
                    name,
                    quantity,
                    weight,
                    calories,
                    protein,
                    carbs,
                    fat,
                    meal,
                    date: Some(day(d)),
                },
            )
    }

    proptest! {
        #[test]
        fn prop_add_then_list_contains_exactly_one_match(
            earlier in prop::collection::vec(arb_food_input(), 0..4),
            input in arb_food_input(),
        ) {
            let store = memory_store();
            for other in earlier {
                store.add_food(other).unwrap();
            }
            let date = input.date.unwrap();
            let entry = store.add_food(input.clone()).unwrap();

            let listed = store.list_by_date(date).unwrap();
            let matches: Vec<&FoodEntry> = listed.iter().filter(|e| e.id == entry.id).collect();
            prop_assert_eq!(matches.len(), 1);
            let stored = matches[0];
            prop_assert_eq!(stored.name.as_str(), input.name.trim());
            prop_assert_eq!(stored.quantity, input.quantity);
            prop_assert_eq!(stored.weight, input.weight);
            prop_assert_eq!(stored.calories, input.calories);
            prop_assert_eq!(stored.protein, input.protein);
            prop_assert_eq!(stored.carbs, input.carbs);
            prop_assert_eq!(stored.fat, input.fat);
            prop_assert_eq!(stored.meal, input.meal);
            prop_assert_eq!(stored.date, date);
            prop_assert_eq!(stored, &entry);
        }

        #[test]
        fn prop_remove_then_list_never_contains_id(
            inputs in prop::collection::vec(arb_food_input(), 1..8),
            remove_mask in prop::collection::vec(any::<bool>(), 8),
        ) {
            let store = memory_store();
            let entries: Vec<FoodEntry> = inputs
                .into_iter()
                .map(|input| store.add_food(input).unwrap())
                .collect();

            let mut removed = Vec::new();
            for (entry, remove) in entries.iter().zip(&remove_mask) {
                if *remove {
                    prop_assert!(store.remove_food(entry.id).unwrap());
                    removed.push(entry.id);
                }
            }

            for entry in &entries {
                let listed = store.list_by_date(entry.date).unwrap();
                let present = listed.iter().any(|e| e.id == entry.id);
                prop_assert_eq!(present, !removed.contains(&entry.id));
            }
        }
    }
}

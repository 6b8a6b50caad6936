use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, params};

use crate::models::{DATE_FORMAT, DayLog, EntryId, FoodEntry, MealType, WaterEntry};
use crate::persistence::{PersistenceAdapter, date_key};

/// Day logs stored in an embedded SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS food_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    date TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    meal_type TEXT NOT NULL,
                    name TEXT NOT NULL,
                    quantity REAL,
                    weight_g REAL,
                    calories REAL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS water_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    date TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    amount_ml REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_food_entries_date ON food_entries(date);
                CREATE INDEX IF NOT EXISTS idx_water_entries_date ON water_entries(date);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_column<T: FromStr>(idx: usize, raw: &str) -> rusqlite::Result<T>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        raw.parse::<T>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn parse_date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    // Expects columns:
    // 0: uuid, 1: date, 2: meal_type, 3: name, 4: quantity, 5: weight_g,
    // 6: calories, 7: protein, 8: carbs, 9: fat, 10: created_at
    fn food_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        let uuid: String = row.get(0)?;
        let date: String = row.get(1)?;
        let meal: String = row.get(2)?;
        Ok(FoodEntry {
            id: Self::parse_column(0, &uuid)?,
            date: Self::parse_date_column(1, &date)?,
            meal: Self::parse_column::<MealType>(2, &meal)?,
            name: row.get(3)?,
            quantity: row.get(4)?,
            weight: row.get(5)?,
            calories: row.get(6)?,
            protein: row.get(7)?,
            carbs: row.get(8)?,
            fat: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    // Expects columns: 0: uuid, 1: date, 2: amount_ml, 3: created_at
    fn water_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WaterEntry> {
        let uuid: String = row.get(0)?;
        let date: String = row.get(1)?;
        Ok(WaterEntry {
            id: Self::parse_column(0, &uuid)?,
            date: Self::parse_date_column(1, &date)?,
            amount_ml: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl PersistenceAdapter for Database {
    #[allow(clippy::cast_possible_wrap)]
    fn save(&self, date: NaiveDate, log: &DayLog) -> Result<()> {
        let date_str = date_key(date);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM food_entries WHERE date = ?1",
            params![date_str],
        )?;
        tx.execute(
            "DELETE FROM water_entries WHERE date = ?1",
            params![date_str],
        )?;

        for (position, e) in log.foods.iter().enumerate() {
            tx.execute(
                "INSERT INTO food_entries (uuid, date, position, meal_type, name, quantity, weight_g, calories, protein, carbs, fat, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    e.id.to_string(),
                    date_str,
                    position as i64,
                    e.meal.as_str(),
                    e.name,
                    e.quantity,
                    e.weight,
                    e.calories,
                    e.protein,
                    e.carbs,
                    e.fat,
                    e.created_at,
                ],
            )?;
        }

        for (position, w) in log.water.iter().enumerate() {
            tx.execute(
                "INSERT INTO water_entries (uuid, date, position, amount_ml, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    w.id.to_string(),
                    date_str,
                    position as i64,
                    w.amount_ml,
                    w.created_at,
                ],
            )?;
        }

        tx.commit()
            .with_context(|| format!("Failed to save entries for {date_str}"))?;
        Ok(())
    }

    fn load(&self, date: NaiveDate) -> Result<DayLog> {
        let date_str = date_key(date);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT uuid, date, meal_type, name, quantity, weight_g, calories, protein, carbs, fat, created_at
             FROM food_entries
             WHERE date = ?1
             ORDER BY position",
        )?;
        let foods = stmt
            .query_map(params![date_str], Self::food_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT uuid, date, amount_ml, created_at
             FROM water_entries
             WHERE date = ?1
             ORDER BY position",
        )?;
        let water = stmt
            .query_map(params![date_str], Self::water_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DayLog { foods, water })
    }

    fn locate(&self, id: &EntryId) -> Result<Option<NaiveDate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date FROM food_entries WHERE uuid = ?1
             UNION ALL
             SELECT date FROM water_entries WHERE uuid = ?1
             LIMIT 1",
        )?;
        let mut rows = stmt.query(params![id.to_string()])?;
        if let Some(row) = rows.next()? {
            let date: String = row.get(0)?;
            Ok(Some(Database::parse_date_column(0, &date)?))
        } else {
            Ok(None)
        }
    }

    fn dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date FROM food_entries
             UNION
             SELECT date FROM water_entries
             ORDER BY date",
        )?;
        let dates = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                Database::parse_date_column(0, &date)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dates)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Local::now().to_rfc3339();
        self.conn.lock().execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn sample_food(name: &str, date: NaiveDate) -> FoodEntry {
        FoodEntry {
            id: EntryId::new(),
            name: name.to_string(),
            quantity: Some(2.0),
            weight: Some(100.0),
            calories: Some(155.0),
            protein: Some(13.0),
            carbs: None,
            fat: Some(11.0),
            meal: MealType::Breakfast,
            date,
            created_at: "2024-06-15T08:00:00+00:00".to_string(),
        }
    }

    fn sample_water(amount_ml: f64, date: NaiveDate) -> WaterEntry {
        WaterEntry {
            id: EntryId::new(),
            amount_ml,
            date,
            created_at: "2024-06-15T09:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_load_unknown_date_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load(day(15)).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_order_and_fields() {
        let db = Database::open_in_memory().unwrap();
        let log = DayLog {
            foods: vec![sample_food("Egg", day(15)), sample_food("Toast", day(15))],
            water: vec![sample_water(250.0, day(15)), sample_water(500.0, day(15))],
        };
        db.save(day(15), &log).unwrap();

        let loaded = db.load(day(15)).unwrap();
        assert_eq!(loaded, log);
        assert!(loaded.foods[0].carbs.is_none());
    }

    #[test]
    fn test_save_replaces_previous_rows() {
        let db = Database::open_in_memory().unwrap();
        let mut log = DayLog {
            foods: vec![sample_food("Egg", day(15)), sample_food("Toast", day(15))],
            water: vec![],
        };
        db.save(day(15), &log).unwrap();

        log.foods.remove(0);
        db.save(day(15), &log).unwrap();

        let loaded = db.load(day(15)).unwrap();
        assert_eq!(loaded.foods.len(), 1);
        assert_eq!(loaded.foods[0].name, "Toast");
    }

    #[test]
    fn test_dates_are_independent() {
        let db = Database::open_in_memory().unwrap();
        db.save(
            day(15),
            &DayLog {
                foods: vec![sample_food("Egg", day(15))],
                water: vec![],
            },
        )
        .unwrap();
        db.save(
            day(14),
            &DayLog {
                foods: vec![],
                water: vec![sample_water(1000.0, day(14))],
            },
        )
        .unwrap();

        assert_eq!(db.load(day(15)).unwrap().foods.len(), 1);
        assert!(db.load(day(15)).unwrap().water.is_empty());
        assert_eq!(db.dates().unwrap(), vec![day(14), day(15)]);
    }

    #[test]
    fn test_locate() {
        let db = Database::open_in_memory().unwrap();
        let food = sample_food("Egg", day(15));
        let water = sample_water(250.0, day(16));
        db.save(
            day(15),
            &DayLog {
                foods: vec![food.clone()],
                water: vec![],
            },
        )
        .unwrap();
        db.save(
            day(16),
            &DayLog {
                foods: vec![],
                water: vec![water.clone()],
            },
        )
        .unwrap();

        assert_eq!(db.locate(&food.id).unwrap(), Some(day(15)));
        assert_eq!(db.locate(&water.id).unwrap(), Some(day(16)));
        assert_eq!(db.locate(&EntryId::new()).unwrap(), None);
    }

    #[test]
    fn test_reopen_file_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kcal.db");
        let food = sample_food("Egg", day(15));
        {
            let db = Database::open(&path).unwrap();
            db.save(
                day(15),
                &DayLog {
                    foods: vec![food.clone()],
                    water: vec![],
                },
            )
            .unwrap();
            db.set_setting("calorie_goal", "1800").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.load(day(15)).unwrap().foods, vec![food]);
        assert_eq!(
            db.get_setting("calorie_goal").unwrap().as_deref(),
            Some("1800")
        );
    }

    #[test]
    fn test_settings_upsert_and_delete() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("calorie_goal", "2000").unwrap();
        db.set_setting("calorie_goal", "2200").unwrap();
        assert_eq!(
            db.get_setting("calorie_goal").unwrap().as_deref(),
            Some("2200")
        );
        assert!(db.delete_setting("calorie_goal").unwrap());
        assert!(!db.delete_setting("calorie_goal").unwrap());
        assert!(db.get_setting("calorie_goal").unwrap().is_none());
    }
}

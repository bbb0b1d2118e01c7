// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SQLite persistence for the schedule between runs

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::event::{ScheduleEvent, Weekday};
use crate::store::ScheduleStore;
use crate::{Result, WeekcalError};

/// Database manager (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub event_count: i64,
    /// Events per day, only days that have any
    pub per_day: Vec<(Weekday, i64)>,
}

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| WeekcalError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                day TEXT NOT NULL,
                location TEXT,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_events_day ON events(day);
        "#,
        )?;
        Ok(())
    }

    /// Replace the stored schedule with `events`, keeping their order
    pub fn save_events(&self, events: &[ScheduleEvent]) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM events", [])?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO events (id, position, title, start_time, end_time, day, location, notes)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;
            for (position, event) in events.iter().enumerate() {
                stmt.execute(params![
                    event.id,
                    position as i64,
                    event.title,
                    event.start_time,
                    event.end_time,
                    event.day.name(),
                    event.location,
                    event.notes,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn reject_writes(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TRIGGER reject_insert BEFORE INSERT ON events
            BEGIN SELECT RAISE(ABORT, 'disk full'); END;
            CREATE TRIGGER reject_delete BEFORE DELETE ON events
            BEGIN SELECT RAISE(ABORT, 'disk full'); END;
        "#,
        )?;
        Ok(())
    }

    /// Load the stored schedule in list order
    pub fn load_events(&self) -> Result<Vec<ScheduleEvent>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, title, start_time, end_time, day, location, notes
               FROM events ORDER BY position"#,
        )?;

        let events = stmt
            .query_map([], |row| {
                let day: String = row.get(4)?;
                Ok(ScheduleEvent {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    start_time: row.get(2)?,
                    end_time: row.get(3)?,
                    day: Weekday::parse_lenient(&day),
                    location: row.get(5)?,
                    notes: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Load the stored schedule as a store
    pub fn load_store(&self) -> Result<ScheduleStore> {
        Ok(ScheduleStore::from_events(self.load_events()?))
    }

    /// Persist a store
    pub fn save_store(&self, store: &ScheduleStore) -> Result<()> {
        self.save_events(store.events())
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let event_count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

        let mut stmt = conn.prepare("SELECT day, COUNT(*) FROM events GROUP BY day")?;
        let mut per_day = stmt
            .query_map([], |row| {
                let day: String = row.get(0)?;
                Ok((Weekday::parse_lenient(&day), row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        per_day.sort_by_key(|(day, _)| *day);

        Ok(DbStats { event_count, per_day })
    }
}

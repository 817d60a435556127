//! SQLite-backed event repository.
//!
//! Tables:
//! - `events`: one row per event, kind stored as tagged JSON
//! - `placements`: one row per placed occurrence
//! - `kv`: id sequence and other small state

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::data_dir;
use super::repository::EventRepository;
use crate::error::{DatabaseError, Result};
use crate::event::{Event, EventId, EventKind, Occurrence, Priority};
use crate::timeline::{Placement, TimeInterval};

const NEXT_ID_KEY: &str = "next_event_id";

// === Helper Functions ===

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("{column} '{value}': {e}")))
}

fn to_i64(id: EventId) -> Result<i64, DatabaseError> {
    i64::try_from(id.0).map_err(|_| DatabaseError::Corrupt(format!("event id {id} out of range")))
}

/// Raw `events` row before decoding.
struct EventRow {
    id: i64,
    title: String,
    priority: String,
    kind: String,
    created_at: String,
    pending: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            priority: row.get(2)?,
            kind: row.get(3)?,
            created_at: row.get(4)?,
            pending: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<Event, DatabaseError> {
        let id = u64::try_from(self.id)
            .map(EventId)
            .map_err(|_| DatabaseError::Corrupt(format!("negative event id {}", self.id)))?;
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|e| DatabaseError::Corrupt(format!("event {id}: {e}")))?;
        let kind: EventKind = serde_json::from_str(&self.kind)
            .map_err(|e| DatabaseError::Corrupt(format!("event {id} kind: {e}")))?;
        let pending: Vec<Occurrence> = serde_json::from_str(&self.pending)
            .map_err(|e| DatabaseError::Corrupt(format!("event {id} pending: {e}")))?;

        Ok(Event {
            id,
            title: self.title,
            priority,
            kind,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            pending,
        })
    }
}

/// SQLite database for events and placements.
pub struct EventDb {
    conn: Connection,
}

impl EventDb {
    /// Open `<data_dir>/<file_name>`, creating the schema if needed.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open(file_name: &str) -> Result<Self> {
        let path = data_dir()?.join(file_name);
        Self::open_path(&path)
    }

    /// Open a database file at an explicit path.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id          INTEGER PRIMARY KEY,
                title       TEXT NOT NULL,
                priority    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                pending     TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS placements (
                event_id    INTEGER NOT NULL,
                occurrence  INTEGER NOT NULL,
                start_time  TEXT NOT NULL,
                end_time    TEXT NOT NULL,
                PRIMARY KEY (event_id, occurrence)
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_placements_start_time ON placements(start_time);",
        )
    }

    /// Run `f` inside an immediate transaction, rolling back on error.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, rusqlite::Error> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
    }
}

impl EventRepository for EventDb {
    fn next_id(&mut self) -> Result<EventId> {
        let id = self.in_transaction(|conn| {
            let stored: Option<String> = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![NEXT_ID_KEY], |row| row.get(0))
                .optional()?;
            let max_existing: i64 =
                conn.query_row("SELECT COALESCE(MAX(id), 0) FROM events", [], |row| row.get(0))?;
            let next = stored
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(1)
                .max(max_existing + 1);
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![NEXT_ID_KEY, (next + 1).to_string()],
            )?;
            Ok(next)
        })?;
        let id = u64::try_from(id).map_err(|_| DatabaseError::Corrupt(format!("id sequence at {id}")))?;
        Ok(EventId(id))
    }

    fn save(&mut self, event: &Event, placements: &[Placement]) -> Result<()> {
        let id = to_i64(event.id)?;
        let kind = serde_json::to_string(&event.kind)?;
        let pending = serde_json::to_string(&event.pending)?;

        self.in_transaction(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO events (id, title, priority, kind, created_at, pending)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    event.title,
                    event.priority.as_str(),
                    kind,
                    event.created_at.to_rfc3339(),
                    pending,
                ],
            )?;
            conn.execute("DELETE FROM placements WHERE event_id = ?1", params![id])?;
            let mut stmt = conn.prepare(
                "INSERT INTO placements (event_id, occurrence, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for placement in placements {
                stmt.execute(params![
                    id,
                    placement.occurrence,
                    placement.interval.start.to_rfc3339(),
                    placement.interval.end.to_rfc3339(),
                ])?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn remove(&mut self, id: EventId) -> Result<bool> {
        let id = to_i64(id)?;
        let removed = self.in_transaction(|conn| {
            conn.execute("DELETE FROM placements WHERE event_id = ?1", params![id])?;
            conn.execute("DELETE FROM events WHERE id = ?1", params![id])
        })?;
        Ok(removed > 0)
    }

    fn get(&self, id: EventId) -> Result<Option<Event>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, priority, kind, created_at, pending FROM events WHERE id = ?1",
                params![to_i64(id)?],
                EventRow::from_row,
            )
            .optional()?;
        Ok(row.map(EventRow::into_event).transpose()?)
    }

    fn list(&self) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, priority, kind, created_at, pending FROM events ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], EventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let events = rows
            .into_iter()
            .map(EventRow::into_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn load_placements(&self) -> Result<Vec<Placement>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, occurrence, start_time, end_time FROM placements ORDER BY start_time",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut placements = Vec::with_capacity(rows.len());
        for (event_id, occurrence, start, end) in rows {
            let event_id = u64::try_from(event_id)
                .map(EventId)
                .map_err(|_| DatabaseError::Corrupt(format!("negative event id {event_id}")))?;
            let interval = TimeInterval::new(
                parse_timestamp("start_time", &start)?,
                parse_timestamp("end_time", &end)?,
            )
            .ok_or_else(|| DatabaseError::Corrupt(format!("empty interval for event {event_id}")))?;
            placements.push(Placement::new(event_id, occurrence, interval));
        }
        Ok(placements)
    }
}

impl EventDb {
    /// Number of stored events.
    pub fn count_events(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Stored value of the id sequence, if any id has been reserved.
    pub fn id_sequence(&self) -> Result<Option<u64>> {
        Ok(self.kv_get(NEXT_ID_KEY)?.and_then(|v| v.parse().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PreferredWindow;
    use chrono::TimeZone;

    fn at(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, 0, 0).unwrap()
    }

    fn recurring(id: EventId) -> Event {
        Event {
            id,
            title: "Gym".into(),
            priority: Priority::Low,
            kind: EventKind::RecurringWithPreferredTime {
                start_date: at(1, 0),
                duration_minutes: 60,
                frequency_days: 2,
                preferred_window: PreferredWindow::parse("06:00 - 09:00").unwrap(),
            },
            created_at: at(1, 0),
            pending: vec![Occurrence {
                index: 2,
                interval: TimeInterval::starting_at(at(5, 6), 60).unwrap(),
            }],
        }
    }

    #[test]
    fn save_and_get_event() {
        let mut db = EventDb::open_memory().unwrap();
        let id = db.next_id().unwrap();
        let event = recurring(id);
        db.save(&event, &[]).unwrap();

        assert_eq!(db.get(id).unwrap(), Some(event));
        assert_eq!(db.count_events().unwrap(), 1);
        assert!(db.get(EventId(999)).unwrap().is_none());
    }

    #[test]
    fn save_replaces_placements() {
        let mut db = EventDb::open_memory().unwrap();
        let id = db.next_id().unwrap();
        let event = recurring(id);
        let first = Placement::new(id, 0, TimeInterval::starting_at(at(1, 6), 60).unwrap());
        let second = Placement::new(id, 1, TimeInterval::starting_at(at(3, 6), 60).unwrap());

        db.save(&event, &[first, second]).unwrap();
        assert_eq!(db.load_placements().unwrap(), vec![first, second]);

        db.save(&event, &[second]).unwrap();
        assert_eq!(db.load_placements().unwrap(), vec![second]);
    }

    #[test]
    fn remove_deletes_event_and_placements() {
        let mut db = EventDb::open_memory().unwrap();
        let id = db.next_id().unwrap();
        let placement = Placement::new(id, 0, TimeInterval::starting_at(at(1, 6), 60).unwrap());
        db.save(&recurring(id), &[placement]).unwrap();

        assert!(db.remove(id).unwrap());
        assert!(!db.remove(id).unwrap());
        assert!(db.list().unwrap().is_empty());
        assert!(db.load_placements().unwrap().is_empty());
    }

    #[test]
    fn ids_keep_increasing_after_delete() {
        let mut db = EventDb::open_memory().unwrap();
        let a = db.next_id().unwrap();
        db.save(&recurring(a), &[]).unwrap();
        let b = db.next_id().unwrap();
        db.save(&recurring(b), &[]).unwrap();
        db.remove(b).unwrap();

        let c = db.next_id().unwrap();
        assert_eq!((a, b, c), (EventId(1), EventId(2), EventId(3)));
        assert_eq!(db.id_sequence().unwrap(), Some(4));
    }

    #[test]
    fn corrupt_kind_is_reported() {
        let mut db = EventDb::open_memory().unwrap();
        let id = db.next_id().unwrap();
        db.save(&recurring(id), &[]).unwrap();
        db.conn
            .execute("UPDATE events SET kind = '{\"type\":\"weekly\"}'", [])
            .unwrap();

        let err = db.list().unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Database(DatabaseError::Corrupt(_))
        ));
    }
}

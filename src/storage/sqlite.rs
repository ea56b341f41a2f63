use super::{LedgerEvent, Storage};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite backend: the same two JSON blobs in a key/value table, plus an
/// append-only audit trail.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    /// Audit trail for one partner or period, newest first
    pub fn events_for_entity(&self, entity_id: &str) -> Result<Vec<LedgerEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_id, data, actor
             FROM events
             WHERE entity_id = ?1
             ORDER BY id DESC",
        )?;

        let events = stmt
            .query_map(params![entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(4)?;

                Ok(LedgerEvent {
                    event_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?
                        .with_timezone(&Utc),
                    event_type: row.get(2)?,
                    entity_id: row.get(3)?,
                    data: serde_json::from_str(&data_json)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    actor: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn event_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS blobs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_id)",
        [],
    )?;

    Ok(())
}

impl Storage for SqliteStorage {
    fn read_blob(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write_blob(&mut self, key: &str, json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn record_event(&mut self, event: &LedgerEvent) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (event_id, timestamp, event_type, entity_id, data, actor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::default_roster;

    #[test]
    fn test_blob_upsert() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.load_partners().unwrap().is_none());

        let mut roster = default_roster();
        storage.save_partners(&roster).unwrap();
        roster[0].name = "Renamed".to_string();
        storage.save_partners(&roster).unwrap();

        assert_eq!(storage.load_partners().unwrap(), Some(roster));
    }

    #[test]
    fn test_events_for_entity() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        let first = LedgerEvent::new("period_recorded", "1700000000000", serde_json::json!({"totalValue": "5500"}), "Byron Smith");
        let second = LedgerEvent::new("period_deleted", "1700000000000", serde_json::json!({}), "James Warner");
        let other = LedgerEvent::new("contribution_updated", "3", serde_json::json!({"contribution": "100"}), "Byron Smith");

        storage.record_event(&first).unwrap();
        storage.record_event(&second).unwrap();
        storage.record_event(&other).unwrap();

        let events = storage.events_for_entity("1700000000000").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "period_deleted");
        assert_eq!(events[1].actor, "Byron Smith");
        assert_eq!(storage.event_count().unwrap(), 3);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.save_periods(&[]).unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.load_periods().unwrap(), Some(vec![]));
    }
}

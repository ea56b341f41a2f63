// 💾 Storage Port - load/save behind one trait
//
// The controller only ever sees `Storage`. Each backend stores two JSON blobs
// under fixed keys (partner roster, period history) and may keep an audit
// trail of successful state changes.
//
// Backends:
// - MemoryStorage   (tests, fakes)
// - JsonFileStorage (one file per key in the data directory)
// - SqliteStorage   (key/value table + events table, WAL mode)

pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::entities::{Partner, Period};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the partner roster blob
pub const PARTNERS_KEY: &str = "cbc-partners";

/// Key of the period history blob
pub const PERIODS_KEY: &str = "cbc-periods";

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// One successful state change ("every change is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl LedgerEvent {
    pub fn new(event_type: &str, entity_id: &str, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

pub trait Storage {
    /// Raw JSON stored under `key`, `None` when nothing was saved yet
    fn read_blob(&self, key: &str) -> Result<Option<String>>;

    fn write_blob(&mut self, key: &str, json: &str) -> Result<()>;

    /// Append to the audit trail. Backends without one ignore events.
    fn record_event(&mut self, _event: &LedgerEvent) -> Result<()> {
        Ok(())
    }

    fn load_partners(&self) -> Result<Option<Vec<Partner>>> {
        load_json(self, PARTNERS_KEY)
    }

    fn save_partners(&mut self, partners: &[Partner]) -> Result<()> {
        let json = serde_json::to_string(partners)?;
        self.write_blob(PARTNERS_KEY, &json)
    }

    fn load_periods(&self) -> Result<Option<Vec<Period>>> {
        load_json(self, PERIODS_KEY)
    }

    fn save_periods(&mut self, periods: &[Period]) -> Result<()> {
        let json = serde_json::to_string(periods)?;
        self.write_blob(PERIODS_KEY, &json)
    }
}

fn load_json<S, T>(storage: &S, key: &str) -> Result<Option<T>>
where
    S: Storage + ?Sized,
    T: serde::de::DeserializeOwned,
{
    match storage.read_blob(key)? {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| LedgerError::Storage(format!("corrupt data under {}: {}", key, e))),
        None => Ok(None),
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read_blob(&self, key: &str) -> Result<Option<String>> {
        (**self).read_blob(key)
    }

    fn write_blob(&mut self, key: &str, json: &str) -> Result<()> {
        (**self).write_blob(key, json)
    }

    fn record_event(&mut self, event: &LedgerEvent) -> Result<()> {
        (**self).record_event(event)
    }
}

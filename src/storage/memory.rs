use super::{LedgerEvent, Storage};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;

/// In-memory backend for tests. Can be told to fail writes to exercise the
/// "Save failed" path.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    blobs: HashMap<String, String>,
    events: Vec<LedgerEvent>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn blob(&self, key: &str) -> Option<&str> {
        self.blobs.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn read_blob(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(LedgerError::Storage("storage unavailable".to_string()));
        }
        Ok(self.blobs.get(key).cloned())
    }

    fn write_blob(&mut self, key: &str, json: &str) -> Result<()> {
        if self.fail_writes {
            return Err(LedgerError::Storage("quota exceeded".to_string()));
        }
        self.blobs.insert(key.to_string(), json.to_string());
        Ok(())
    }

    fn record_event(&mut self, event: &LedgerEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

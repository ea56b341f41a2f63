//! Runtime configuration, read from `LEDGER_*` environment variables.

use crate::allocation::DEFAULT_FEE_RATE;
use crate::error::{LedgerError, Result};
use crate::session::password_digest;
use crate::storage::{JsonFileStorage, SqliteStorage, Storage};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// The partnership's shared password, used when no digest is configured
const DEFAULT_SHARED_PASSWORD: &str = "wheaton";

const DEFAULT_DATA_DIR: &str = "./ledger-data";
const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Json,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(LedgerError::Config(format!(
                "LEDGER_STORAGE must be 'json' or 'sqlite', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// Annual management fee rate
    pub fee_rate: Decimal,
    pub password_digest: String,
    pub bind_addr: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage: StorageBackend::Json,
            fee_rate: DEFAULT_FEE_RATE,
            password_digest: password_digest(DEFAULT_SHARED_PASSWORD),
            bind_addr: DEFAULT_BIND.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(dir) = lookup("LEDGER_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(backend) = lookup("LEDGER_STORAGE") {
            config.storage = backend.parse()?;
        }

        if let Some(rate) = lookup("LEDGER_FEE_RATE") {
            let rate = Decimal::from_str(rate.trim()).map_err(|_| {
                LedgerError::Config(format!("LEDGER_FEE_RATE is not a number: '{}'", rate))
            })?;
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(LedgerError::Config(format!(
                    "LEDGER_FEE_RATE must be in [0, 1), got {}",
                    rate
                )));
            }
            config.fee_rate = rate;
        }

        if let Some(digest) = lookup("LEDGER_PASSWORD_SHA256") {
            let digest = digest.trim().to_lowercase();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(LedgerError::Config(
                    "LEDGER_PASSWORD_SHA256 must be a 64-character hex SHA-256 digest".to_string(),
                ));
            }
            config.password_digest = digest;
        }

        if let Some(bind) = lookup("LEDGER_BIND").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = bind;
        }

        if let Some(format) = lookup("LEDGER_LOG_FORMAT") {
            config.log_format = if format.eq_ignore_ascii_case("json") {
                LogFormat::Json
            } else {
                LogFormat::Text
            };
        }

        Ok(config)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("ledger.log")
    }

    /// Open the configured backend, creating the data directory if needed
    pub fn open_storage(&self) -> Result<Box<dyn Storage + Send>> {
        match self.storage {
            StorageBackend::Json => Ok(Box::new(JsonFileStorage::open(&self.data_dir)?)),
            StorageBackend::Sqlite => {
                std::fs::create_dir_all(&self.data_dir)?;
                Ok(Box::new(SqliteStorage::open(self.sqlite_path())?))
            }
        }
    }
}

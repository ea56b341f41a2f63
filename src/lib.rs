// Partnership Ledger - Core Library
// Exposes all modules for use in CLI, TUI, API server, and tests

pub mod allocation;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod entities;
pub mod error;
pub mod export;
pub mod logging;
pub mod session;
pub mod state;
pub mod storage;

// Re-export commonly used types
pub use allocation::{
    compute_ownership, summarize, total_contributions,
    AllocationEngine, LedgerSummary, PeriodInput,
    DEFAULT_FEE_RATE, MISSING_INPUTS_MESSAGE,
};
pub use clipboard::{Clipboard, Osc52Clipboard};
pub use config::{Config, LogFormat, StorageBackend};
pub use controller::Controller;
pub use entities::{default_roster, Partner, PartnerAllocation, Period};
pub use error::{LedgerError, LoginError, Result};
pub use export::{export_file_name, format_amount, format_signed, generate_csv, write_csv_file};
pub use session::{password_digest, LoginGate, Session};
pub use state::{parse_amount, parse_date, reduce, Action, LedgerState, PeriodDraft};
pub use storage::{
    JsonFileStorage, LedgerEvent, MemoryStorage, SqliteStorage, Storage,
    PARTNERS_KEY, PERIODS_KEY,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Partnership name, shown in the UI header
pub const FIRM_NAME: &str = "Covered Bridge Capital";

// Expense Tracker - Core Library
// Exposes all modules for use in the CLI, the TUI, and tests

pub mod config;
pub mod display;
pub mod expense;
pub mod importer;
pub mod logging;
pub mod period;
pub mod storage;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use config::{AppConfig, LogConfig};
pub use expense::{Dated, Expense, ExpenseError, NewExpense, DEFAULT_CATEGORY};
pub use importer::{
    import_file, parse, parse_at, ImportError, ImportReport, ImportStatus, RowOutcome,
    SkipReason,
};
pub use period::{filter_by_period, filter_by_period_at, Period};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use store::{ExpenseStore, ExpenseView, StoreConfig, StoreError};
pub use summary::{summarize, CategoryTotal, Summary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

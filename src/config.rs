// ⚙️ Configuration from environment (+ optional .env file)

use crate::store::{StoreConfig, DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "EXPENSE_TRACKER_DB";
pub const ENV_STORAGE_KEY: &str = "EXPENSE_TRACKER_STORAGE_KEY";
pub const ENV_DEBOUNCE_MS: &str = "EXPENSE_TRACKER_DEBOUNCE_MS";
pub const ENV_LOG_LEVEL: &str = "EXPENSE_TRACKER_LOG_LEVEL";
pub const ENV_LOG_PATH: &str = "EXPENSE_TRACKER_LOG_PATH";

const DEFAULT_DB_PATH: &str = "expenses.db";

/// Load `.env` from the working directory, if there is one
pub fn init() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Filter directive such as `info` or `expense_tracker=debug`
    pub level: Option<String>,
    /// Write logs to this file instead of stderr
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub store: StoreConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            store: StoreConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let debounce = get(ENV_DEBOUNCE_MS)
            .and_then(|raw| parse_or_warn::<u64>(ENV_DEBOUNCE_MS, &raw))
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        AppConfig {
            db_path: get(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            store: StoreConfig {
                storage_key: get(ENV_STORAGE_KEY).unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
                debounce,
            },
            log: LogConfig {
                level: get(ENV_LOG_LEVEL),
                path: get(ENV_LOG_PATH).map(PathBuf::from),
            },
        }
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(val) => Some(val),
        Err(_) => {
            // Runs before the subscriber exists, so this goes to stderr directly
            eprintln!("⚠️  Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));

        assert_eq!(config.db_path, PathBuf::from("expenses.db"));
        assert_eq!(config.store.storage_key, "expenses");
        assert_eq!(config.store.debounce, Duration::from_millis(1000));
        assert!(config.log.level.is_none());
        assert!(config.log.path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/tmp/mine.db"),
            (ENV_STORAGE_KEY, "spending"),
            (ENV_DEBOUNCE_MS, "250"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_PATH, "/tmp/expenses.log"),
        ]));

        assert_eq!(config.db_path, PathBuf::from("/tmp/mine.db"));
        assert_eq!(config.store.storage_key, "spending");
        assert_eq!(config.store.debounce, Duration::from_millis(250));
        assert_eq!(config.log.level.as_deref(), Some("debug"));
        assert_eq!(config.log.path, Some(PathBuf::from("/tmp/expenses.log")));
    }

    #[test]
    fn test_invalid_and_blank_values_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_DEBOUNCE_MS, "soon"),
            (ENV_STORAGE_KEY, "   "),
        ]));

        assert_eq!(config.store.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.store.storage_key, DEFAULT_STORAGE_KEY);
    }
}

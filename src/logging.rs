// 📝 Logging setup (tracing)

use crate::config::LogConfig;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

fn resolve_env_filter(config: &LogConfig) -> EnvFilter {
    if let Some(filter) = config
        .level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Open (or create) the log file without rotation
fn file_writer(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("expense-tracker.log");

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Install the global subscriber once per process.
///
/// With `config.path` set, logs go to that file. Otherwise they go to stderr,
/// unless `console` is false (the TUI owns the terminal). A log file that
/// cannot be opened is reported and treated as if no path was set.
pub fn init(config: &LogConfig, console: bool) {
    INIT.get_or_init(|| {
        let env_filter = resolve_env_filter(config);

        let writer = match config.path.as_deref().map(file_writer) {
            Some(Ok(writer)) => Some(writer),
            Some(Err(e)) => {
                eprintln!("⚠️  {:#}; logging to stderr instead", e);
                None
            }
            None => None,
        };

        if let Some(writer) = writer {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .try_init();
        } else if console {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

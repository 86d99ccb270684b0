//! Subscriber setup. CLI commands log to stderr; the TUI owns the terminal, so
//! it logs to a file in the data directory instead.

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const TUI_LOG_FILE: &str = "chub-search.log";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs a stderr subscriber honouring `RUST_LOG`. Safe to call twice; the
/// second call is a no-op.
pub fn init_stderr(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Installs a file subscriber under `data_dir`. Keep the guard alive for the
/// lifetime of the UI or buffered lines are lost.
pub fn init_file(data_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let appender = tracing_appender::rolling::never(data_dir, TUI_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_ansi(false)
        .with_writer(writer)
        .try_init();
    Ok(guard)
}

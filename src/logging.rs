use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,sqlx=warn,hyper=info,tower=info,reqwest=info")
    })
}

/// Server logging: human-readable events on stderr.
pub fn init_stderr() -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_filter(env_filter()),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

/// TUI logging. The terminal is in raw mode, so events go to a file instead.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_file(path: &Path) -> Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .context("log file path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter()),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

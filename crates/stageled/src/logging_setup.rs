//! Process-wide `tracing` subscriber
//!
//! Console output goes to stderr so the status line never interleaves with
//! anything a supervisor reads from stdout. The optional file sink is
//! written by a background worker; keep the returned [`LogGuard`] alive
//! until shutdown or the tail of the log is lost.

use anyhow::{Context, Result};
use stageled_core::LogConfig;
use std::fs::File;
use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Flushes the file sink when dropped
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
    /// File receiving the log, if any
    pub path: Option<PathBuf>,
}

/// `RUST_LOG` wins over the configured level
fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Prepare the log directory and open this session's log file
fn open_log_file(config: &LogConfig) -> Result<(PathBuf, File)> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_directory))?;

    match config.cleanup_old_logs() {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {} old log file(s)", removed),
        Err(e) => eprintln!("Warning: could not clean up old logs: {}", e),
    }

    let path = config.current_log_path();
    let file =
        File::create(&path).with_context(|| format!("Failed to create log file {:?}", path))?;
    Ok((path, file))
}

/// Install the global subscriber described by `config`
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let console = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_target(false)
            .with_filter(filter(config))
    });

    let mut guard = LogGuard {
        _worker: None,
        path: None,
    };

    let file = if config.file_output {
        let (path, file) = open_log_file(config)?;
        let (writer, worker): (NonBlocking, WorkerGuard) = tracing_appender::non_blocking(file);
        guard._worker = Some(worker);
        guard.path = Some(path);

        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(filter(config)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install log subscriber")?;

    tracing::info!("Logging at level {}", config.level);
    if let Some(path) = &guard.path {
        tracing::info!("Writing log to {:?}", path);
    }

    Ok(guard)
}

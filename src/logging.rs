//! Tracing setup for monitor runs.
//!
//! Each run logs to stderr and to its own `mediamon_<timestamp>.log` file.
//! Only the newest `logging.max_files` run logs are kept, so an hourly cron
//! job does not fill the log directory.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};
use crate::config::LoggingSettings;

const RUN_LOG_PREFIX: &str = "mediamon_";
const RUN_LOG_EXTENSION: &str = "log";
const STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
const LINE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Keeps the file writer flushing until the process exits.
static FILE_WRITER: OnceLock<WorkerGuard> = OnceLock::new();

/// Reasons file logging could not be set up.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be resolved or created.
    #[error(transparent)]
    Dir(#[from] AppDirError),
    #[error("Cannot open run log {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Cannot prune run logs in {path}: {source}")]
    Prune { path: PathBuf, source: io::Error },
    #[error("Cannot format run log name: {0}")]
    Stamp(#[from] time::error::Format),
    #[error("A global tracing subscriber is already installed: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Log to stderr and a fresh run log file. Calling it again is a no-op.
///
/// On error nothing is installed; callers fall back to [`init_stderr_only`].
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    if FILE_WRITER.get().is_some() {
        return Ok(());
    }
    let dir = match &settings.directory {
        Some(dir) => app_dirs::ensure_dir(dir.clone())?,
        None => app_dirs::logs_dir()?,
    };
    let path = dir.join(run_log_name(local_now())?);
    let file = open_run_log(&path)?;
    prune_run_logs(&dir, settings.max_files.max(1))?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    let subscriber = Registry::default()
        .with(env_filter())
        .with(fmt::layer().with_timer(line_timer()).with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(line_timer())
                .with_writer(writer),
        );
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = FILE_WRITER.set(guard);

    tracing::info!(path = %path.display(), "Run log opened");
    Ok(())
}

/// Log to stderr only. Used when the run log cannot be opened and by the
/// read-only subcommands.
pub fn init_stderr_only() {
    let subscriber = Registry::default()
        .with(env_filter())
        .with(fmt::layer().with_timer(line_timer()).with_writer(io::stderr));
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_log_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    Ok(format!(
        "{RUN_LOG_PREFIX}{}.{RUN_LOG_EXTENSION}",
        now.format(STAMP)?
    ))
}

fn open_run_log(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete the oldest run logs so at most `keep` remain. Returns how many
/// were removed.
fn prune_run_logs(dir: &Path, keep: usize) -> Result<usize, LoggingError> {
    let prune_err = |source| LoggingError::Prune {
        path: dir.to_path_buf(),
        source,
    };
    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(prune_err)?.flatten() {
        let path = entry.path();
        if !is_run_log(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_file() {
            logs.push((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path));
        }
    }
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for (_, path) in &logs[..excess] {
        fs::remove_file(path).map_err(prune_err)?;
    }
    Ok(excess)
}

fn is_run_log(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(RUN_LOG_PREFIX));
    named && path.extension().and_then(|ext| ext.to_str()) == Some(RUN_LOG_EXTENSION)
}

fn line_timer() -> OffsetTime<&'static [BorrowedFormatItem<'static>]> {
    OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        LINE_TIME,
    )
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn run_log_name_carries_the_start_time() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(run_log_name(start).unwrap(), "mediamon_2023-11-14_22-13-20.log");
    }

    #[test]
    fn prune_keeps_newest_run_logs_only() {
        let dir = tempdir().unwrap();
        for idx in 0..5 {
            open_run_log(&dir.path().join(format!("mediamon_{idx}.log"))).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
        fs::write(dir.path().join("other.log"), b"not ours").unwrap();

        assert_eq!(prune_run_logs(dir.path(), 3).unwrap(), 2);
        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "mediamon_2.log",
                "mediamon_3.log",
                "mediamon_4.log",
                "notes.txt",
                "other.log",
            ]
        );
    }

    #[test]
    fn prune_is_a_no_op_under_the_limit() {
        let dir = tempdir().unwrap();
        open_run_log(&dir.path().join("mediamon_0.log")).unwrap();
        assert_eq!(prune_run_logs(dir.path(), 10).unwrap(), 0);
    }
}

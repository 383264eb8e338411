//! Logging setup.
//!
//! Console output plus an append-only file at `{log_dir}/chzzk-srec.log`, both
//! stamped in the local timezone. `RUST_LOG` overrides the configured level.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::utils::fs;
use crate::{Error, Result};

/// File name of the log inside the log directory.
pub const LOG_FILE_NAME: &str = "chzzk-srec.log";

/// Crates whose events are recorded.
const LOG_TARGETS: &[&str] = &["chzzk_srec", "platforms_parser", "process_utils"];

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Filter directive for `level` applied to every crate of the workspace.
pub fn default_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Initialize the global subscriber.
///
/// Keep the returned guard alive for the lifetime of the process, dropping it
/// flushes the file writer.
pub fn init_logging(log_dir: &Path, level: &str) -> Result<WorkerGuard> {
    fs::ensure_dir_all_sync_with_op("creating log directory", log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

/// Console-only logging for short-lived commands (`stop`, `status`).
pub fn init_console_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .try_init();
}

/// Last `count` lines of the log file. A missing file yields no lines.
pub fn tail_lines(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io_path("opening log file", path, e)),
    };

    let mut tail = VecDeque::with_capacity(count);
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::io_path("reading log file", path, e))?;
        if count == 0 {
            continue;
        }
        if tail.len() == count {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_filter_covers_workspace_crates() {
        let filter = default_filter("debug");
        assert_eq!(
            filter,
            "chzzk_srec=debug,platforms_parser=debug,process_utils=debug"
        );
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_tail_lines_returns_last_lines() {
        let temp = TempDir::new().unwrap();
        let path = log_file_path(temp.path());
        let content: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        std::fs::write(&path, content).unwrap();

        let lines = tail_lines(&path, 3).unwrap();
        assert_eq!(lines, vec!["line 28", "line 29", "line 30"]);
        assert_eq!(tail_lines(&path, 100).unwrap().len(), 30);
        assert!(tail_lines(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_tail_lines_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let lines = tail_lines(&temp.path().join("absent.log"), 5).unwrap();
        assert!(lines.is_empty());
    }
}

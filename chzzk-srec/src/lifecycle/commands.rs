//! `stop` and `status` commands.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::pid_file::{self, InstanceState};
use crate::config::{RetentionConfig, RuntimePaths};
use crate::logging::{log_file_path, tail_lines};
use crate::retention::{DiskUsageProbe, RetentionManager, StorageSummary};
use crate::{Error, Result};

/// Interval between liveness checks while waiting for the recorder to exit.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How `stop` ended the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after SIGTERM.
    Graceful { pid: u32 },
    /// Still alive after the timeout and killed.
    Forced { pid: u32 },
}

/// Ask the running recorder to shut down, killing it after `timeout`.
pub async fn stop(paths: &RuntimePaths, timeout: Duration) -> Result<StopOutcome> {
    let pid = match pid_file::inspect(&paths.pid_file)? {
        InstanceState::NotRunning => {
            return Err(Error::NotRunning(format!(
                "no pid file at {}",
                paths.pid_file.display()
            )));
        }
        InstanceState::Stale(pid) => {
            pid_file::remove(&paths.pid_file)?;
            return Err(Error::NotRunning(format!(
                "removed stale pid file (pid {pid} is gone)"
            )));
        }
        InstanceState::Running(pid) => pid,
    };

    info!(pid, "Sending termination signal to recorder");
    process_utils::terminate(pid).map_err(|e| Error::Other(format!("failed to signal {pid}: {e}")))?;

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !process_utils::is_alive(pid) {
            info!(pid, "Recorder stopped");
            return Ok(StopOutcome::Graceful { pid });
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }

    if !process_utils::is_alive(pid) {
        return Ok(StopOutcome::Graceful { pid });
    }

    warn!(pid, timeout_secs = timeout.as_secs(), "Recorder did not stop in time, killing it");
    if let Err(e) = process_utils::force_kill(pid)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        return Err(Error::Other(format!("failed to kill {pid}: {e}")));
    }
    // A killed recorder cannot clean up after itself.
    pid_file::remove(&paths.pid_file)?;
    Ok(StopOutcome::Forced { pid })
}

/// Snapshot printed by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub instance: InstanceState,
    pub log_tail: Vec<String>,
    pub storage: StorageSummary,
}

impl StatusReport {
    pub fn is_running(&self) -> bool {
        matches!(self.instance, InstanceState::Running(_))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("failed to encode status: {e}")))
    }
}

pub async fn status(
    paths: &RuntimePaths,
    lines: usize,
    disk: Arc<dyn DiskUsageProbe>,
) -> Result<StatusReport> {
    let instance = pid_file::inspect(&paths.pid_file)?;
    let log_tail = tail_lines(&log_file_path(&paths.log_dir), lines)?;

    let storage = RetentionManager::new(
        &paths.output_dir,
        &paths.output_format,
        RetentionConfig {
            retention_days: 0,
            max_disk_usage_percent: 0,
            interval: Duration::MAX,
        },
        disk,
    )
    .summary()
    .await?;

    Ok(StatusReport {
        instance,
        log_tail,
        storage,
    })
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            InstanceState::Running(pid) => writeln!(f, "Status: running (pid {pid})")?,
            InstanceState::Stale(pid) => writeln!(f, "Status: not running (stale pid {pid})")?,
            InstanceState::NotRunning => writeln!(f, "Status: not running")?,
        }

        write!(
            f,
            "Recordings: {} ({})",
            self.storage.recordings,
            format_bytes(self.storage.total_bytes)
        )?;
        if let Some(disk) = self.storage.disk {
            write!(
                f,
                ", disk {:.1}% used ({} free)",
                disk.used_percent(),
                format_bytes(disk.available_bytes)
            )?;
        }
        writeln!(f)?;

        if !self.log_tail.is_empty() {
            writeln!(f, "Recent log:")?;
            for line in &self.log_tail {
                writeln!(f, "  {line}")?;
            }
        }
        Ok(())
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

//! Capture launcher trait and session types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use super::utils::{file_size, wait_for_exit};
use crate::Result;
use crate::monitor::LiveStream;

/// Lifecycle status of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Running,
    Completed,
    Failed,
}

/// How a capture child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitOutcome {
    /// Exit code 0.
    Completed,
    /// Nonzero exit code, `-1` when killed by a signal or the wait failed.
    FailedWithCode(i32),
    /// Terminated by us during shutdown.
    Killed,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Completed)
    }
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitOutcome::Completed => write!(f, "completed"),
            ExitOutcome::FailedWithCode(code) => write!(f, "failed with code {code}"),
            ExitOutcome::Killed => write!(f, "killed"),
        }
    }
}

/// One running capture: the child process and the file it writes.
///
/// Dropping the session kills the child.
#[derive(Debug)]
pub struct CaptureSession {
    started_at: DateTime<Utc>,
    output_path: PathBuf,
    child: Child,
    pid: Option<u32>,
    status: CaptureStatus,
}

impl CaptureSession {
    pub fn new(child: Child, output_path: impl Into<PathBuf>) -> Self {
        let pid = child.id();
        Self {
            started_at: Utc::now(),
            output_path: output_path.into(),
            child,
            pid,
            status: CaptureStatus::Running,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    /// Bytes written so far, `0` when the file does not exist yet.
    pub async fn output_size(&self) -> u64 {
        file_size(&self.output_path).await.unwrap_or(0)
    }

    /// Suspend until the child exits or `shutdown` is cancelled.
    ///
    /// On shutdown the child is terminated gracefully (see
    /// [`terminate_gracefully`](super::utils::terminate_gracefully)) and the
    /// outcome is [`ExitOutcome::Killed`].
    pub async fn wait_for_exit(
        &mut self,
        shutdown: &CancellationToken,
        grace: Duration,
    ) -> ExitOutcome {
        let outcome = wait_for_exit(&mut self.child, shutdown, grace).await;
        self.status = if outcome.is_success() {
            CaptureStatus::Completed
        } else {
            CaptureStatus::Failed
        };
        outcome
    }
}

/// Starts capture processes.
#[async_trait]
pub trait CaptureLauncher: Send + Sync + 'static {
    /// Human-readable engine name for logs.
    fn name(&self) -> &str;

    /// Start capturing `stream` into `output` and return immediately.
    ///
    /// Failing to start the process is an [`Error::Launch`](crate::Error::Launch).
    async fn launch(&self, stream: &LiveStream, output: &Path) -> Result<CaptureSession>;
}

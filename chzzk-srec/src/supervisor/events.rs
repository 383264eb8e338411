//! Events emitted by the supervisor.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::downloader::ExitOutcome;

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Live,
    Offline,
    Failed(String),
}

/// Observable trace of a supervisor run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SupervisorEvent {
    Probed(ProbeOutcome),
    CaptureStarted {
        output: PathBuf,
        title: String,
    },
    CaptureFinished {
        output: PathBuf,
        outcome: ExitOutcome,
        bytes: u64,
    },
    LaunchFailed {
        attempt: u32,
        error: String,
    },
    /// A failure delay was scheduled before the next probe.
    BackoffScheduled {
        failures: u32,
        delay: Duration,
    },
    RetentionApplied {
        deleted: usize,
    },
    ShutdownRequested,
    Stopped,
}

/// Optional sink for [`SupervisorEvent`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<mpsc::UnboundedSender<SupervisorEvent>>);

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        Self(Some(tx))
    }

    pub(crate) fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.0 {
            // Receiver gone just means nobody is listening anymore.
            let _ = tx.send(event);
        }
    }
}

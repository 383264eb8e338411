//! Shared fixtures for supervisor integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chzzk_srec::config::RetentionConfig;
use chzzk_srec::domain::{BackoffPolicy, BackoffStrategy};
use chzzk_srec::downloader::{CaptureLauncher, CaptureSession, OutputNamer};
use chzzk_srec::monitor::{LiveProber, LiveStatus, LiveStream};
use chzzk_srec::retention::{DiskUsage, DiskUsageProbe, RetentionManager};
use chzzk_srec::supervisor::{Supervisor, SupervisorConfig, SupervisorEvent, SupervisorState};
use chzzk_srec::{Error, Result};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Writes a few bytes and exits cleanly.
pub const RECORD_OK: &str = r#"printf recording > "$1"; exit 0"#;
/// Writes a few bytes and fails.
pub const RECORD_THEN_FAIL: &str = r#"printf partial > "$1"; exit 1"#;
/// Fails before writing anything.
pub const FAIL_NO_OUTPUT: &str = "exit 1";
/// Records until terminated.
pub const RECORD_FOREVER: &str = r#"printf recording > "$1"; exec sleep 30"#;
/// Records and ignores SIGTERM.
pub const IGNORE_SIGTERM: &str =
    r#"trap '' TERM; printf recording > "$1"; while :; do sleep 0.05; done"#;

#[derive(Debug, Clone, Copy)]
pub enum Probe {
    Live,
    Offline,
    Fail,
}

pub fn live_stream() -> LiveStream {
    LiveStream {
        channel_id: "abc123".to_string(),
        channel_name: "Streamer".to_string(),
        title: "test broadcast".to_string(),
        category: Some("Talk".to_string()),
        opened_at: None,
        stream_url: "https://chzzk.naver.com/live/abc123".to_string(),
    }
}

/// Plays back `script`, then repeats `fallback` forever.
pub struct ScriptedProber {
    script: Mutex<VecDeque<Probe>>,
    fallback: Probe,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProber {
    pub fn new(script: &[Probe], fallback: Probe) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let prober = Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: calls.clone(),
        };
        (prober, calls)
    }
}

#[async_trait]
impl LiveProber for ScriptedProber {
    async fn probe(&self) -> Result<LiveStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match step {
            Probe::Live => Ok(LiveStatus::Live(live_stream())),
            Probe::Offline => Ok(LiveStatus::Offline),
            Probe::Fail => Err(Error::Other("metadata source unavailable".to_string())),
        }
    }
}

/// Runs `sh -c <script> sh <output>` per launch. `None` fails the launch itself.
pub struct ShellLauncher {
    scripts: Mutex<VecDeque<Option<&'static str>>>,
    fallback: Option<&'static str>,
    pids: Arc<Mutex<Vec<u32>>>,
}

impl ShellLauncher {
    pub fn new(
        scripts: &[Option<&'static str>],
        fallback: Option<&'static str>,
    ) -> (Self, Arc<Mutex<Vec<u32>>>) {
        let pids = Arc::new(Mutex::new(Vec::new()));
        let launcher = Self {
            scripts: Mutex::new(scripts.iter().copied().collect()),
            fallback,
            pids: pids.clone(),
        };
        (launcher, pids)
    }
}

#[async_trait]
impl CaptureLauncher for ShellLauncher {
    fn name(&self) -> &str {
        "shell"
    }

    async fn launch(&self, _stream: &LiveStream, output: &Path) -> Result<CaptureSession> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        let Some(script) = script else {
            return Err(Error::launch("capture tool not found"));
        };

        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let child = process_utils::tokio_command("sh")
            .arg("-c")
            .arg(script)
            .arg("sh")
            .arg(output)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch(e.to_string()))?;
        if let Some(pid) = child.id() {
            self.pids.lock().unwrap().push(pid);
        }
        Ok(CaptureSession::new(child, output))
    }
}

/// Disk that is never full.
pub struct RoomyDisk;

impl DiskUsageProbe for RoomyDisk {
    fn usage(&self, _path: &Path) -> Result<DiskUsage> {
        Ok(DiskUsage {
            total_bytes: 1 << 40,
            available_bytes: 1 << 39,
        })
    }
}

pub fn fast_config(retry_count: u32) -> SupervisorConfig {
    SupervisorConfig {
        channel_id: "abc123".to_string(),
        poll_interval: Duration::from_millis(30),
        retry_count,
        retry_delay: Duration::from_millis(10),
        backoff: BackoffPolicy::new(
            BackoffStrategy::Exponential,
            Duration::from_millis(30),
            Duration::from_millis(200),
        ),
        shutdown_grace: Duration::from_secs(2),
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub token: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            token: CancellationToken::new(),
        }
    }

    pub fn recordings(&self) -> PathBuf {
        self.dir.path().join("recordings")
    }

    pub fn retention(&self, retention_days: u32) -> RetentionManager {
        self.retention_with(RetentionConfig {
            retention_days,
            max_disk_usage_percent: 0,
            interval: Duration::from_secs(3600),
        })
    }

    pub fn retention_with(&self, config: RetentionConfig) -> RetentionManager {
        RetentionManager::new(self.recordings(), "mp4", config, Arc::new(RoomyDisk))
    }

    pub fn supervisor<P: LiveProber, L: CaptureLauncher>(
        &self,
        config: SupervisorConfig,
        prober: P,
        launcher: L,
        retention: RetentionManager,
    ) -> Supervisor<P, L> {
        Supervisor::new(
            config,
            prober,
            launcher,
            OutputNamer::new(self.recordings(), "mp4"),
            retention,
            self.token.clone(),
        )
    }
}

pub struct RunResult {
    pub result: Result<()>,
    pub events: Vec<SupervisorEvent>,
    pub state: SupervisorState,
}

/// Run `supervisor`, cancelling the token once `stop_when` holds for the
/// events seen so far.
pub async fn run_until<P, L, F>(
    supervisor: Supervisor<P, L>,
    token: CancellationToken,
    stop_when: F,
) -> RunResult
where
    P: LiveProber,
    L: CaptureLauncher,
    F: Fn(&[SupervisorEvent]) -> bool + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = supervisor.with_events(tx);

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
            if !token.is_cancelled() && stop_when(&seen) {
                token.cancel();
            }
        }
        seen
    });

    let result = tokio::time::timeout(Duration::from_secs(30), supervisor.run())
        .await
        .expect("supervisor did not stop in time");
    let state = supervisor.state().clone();
    drop(supervisor);

    RunResult {
        result,
        events: watcher.await.unwrap(),
        state,
    }
}

pub fn count(events: &[SupervisorEvent], pred: impl Fn(&SupervisorEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

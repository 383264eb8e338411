//! Supervisor loop implementation.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::{EventSink, ProbeOutcome, SupervisorEvent};
use super::state::{SupervisorPhase, SupervisorState};
use crate::config::ChannelConfig;
use crate::domain::BackoffPolicy;
use crate::downloader::{CaptureLauncher, ExitOutcome, OutputNamer};
use crate::monitor::{LiveProber, LiveStatus, LiveStream};
use crate::retention::RetentionManager;
use crate::{Error, Result};

/// Timing and retry settings of the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub channel_id: String,
    pub poll_interval: Duration,
    /// Failures tolerated with the quick retry delay before backing off. Also
    /// the number of consecutive launch failures that ends the run.
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffPolicy,
    /// Time a capture gets to exit after SIGTERM during shutdown.
    pub shutdown_grace: Duration,
}

impl From<&ChannelConfig> for SupervisorConfig {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            channel_id: config.channel_id.clone(),
            poll_interval: config.poll_interval,
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            backoff: config.backoff.clone(),
            shutdown_grace: config.shutdown_grace,
        }
    }
}

/// How a capture attempt ended, from the loop's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureResult {
    /// Exit code 0; probe again right away.
    Completed,
    /// Nonzero exit but the channel went offline.
    StreamEnded,
    /// Launch or runtime failure; counters already updated.
    Failed,
    /// Shutdown requested while capturing.
    Shutdown,
}

/// Orchestrates probing, capturing and retention for one channel.
pub struct Supervisor<P: LiveProber, L: CaptureLauncher> {
    config: SupervisorConfig,
    prober: P,
    launcher: L,
    namer: OutputNamer,
    retention: RetentionManager,
    state: SupervisorState,
    events: EventSink,
    shutdown: CancellationToken,
    last_retention: Instant,
}

impl<P: LiveProber, L: CaptureLauncher> Supervisor<P, L> {
    pub fn new(
        config: SupervisorConfig,
        prober: P,
        launcher: L,
        namer: OutputNamer,
        retention: RetentionManager,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            prober,
            launcher,
            namer,
            retention,
            state: SupervisorState::default(),
            events: EventSink::default(),
            shutdown,
            last_retention: Instant::now(),
        }
    }

    /// Send every [`SupervisorEvent`] to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Run until shutdown is requested or launch retries are exhausted.
    ///
    /// Returns `Ok(())` after a clean shutdown. The only fatal error is
    /// [`Error::LaunchExhausted`].
    pub async fn run(&mut self) -> Result<()> {
        info!(
            channel = %self.config.channel_id,
            launcher = %self.launcher.name(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Supervisor started"
        );

        let result = self.run_loop().await;

        if self.shutdown.is_cancelled() {
            self.enter_shutdown();
        }
        self.state.phase = SupervisorPhase::Stopped;
        self.events.emit(SupervisorEvent::Stopped);

        match &result {
            Ok(()) => info!(
                sessions = self.state.sessions_started,
                "Supervisor stopped"
            ),
            Err(e) => error!(error = %e, "Supervisor stopped on fatal error"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let Some(status) = self.probe().await else {
                return Ok(());
            };

            // A failed probe counts as "not live, retry later".
            match status {
                Ok(LiveStatus::Live(stream)) => match self.capture(stream).await? {
                    CaptureResult::Completed => continue,
                    CaptureResult::Shutdown => return Ok(()),
                    CaptureResult::StreamEnded | CaptureResult::Failed => {}
                },
                Ok(LiveStatus::Offline) => self.clear_failures_on_offline(),
                Err(_) => {}
            }

            self.retention_if_due().await;

            self.state.phase = SupervisorPhase::Idle;
            let delay = self.next_delay();
            if !self.sleep(delay).await {
                return Ok(());
            }
        }
    }

    /// Probe once; `None` when shutdown interrupted the probe.
    async fn probe(&mut self) -> Option<Result<LiveStatus>> {
        self.state.phase = SupervisorPhase::Probing;
        let result = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            result = self.prober.probe() => result,
        };
        self.state.last_probe_at = Some(Utc::now());

        match result {
            Ok(LiveStatus::Live(stream)) => {
                info!(
                    channel = %stream.channel_name,
                    title = %stream.title,
                    category = stream.category.as_deref().unwrap_or("-"),
                    "Channel is live"
                );
                self.events.emit(SupervisorEvent::Probed(ProbeOutcome::Live));
                Some(Ok(LiveStatus::Live(stream)))
            }
            Ok(LiveStatus::Offline) => {
                info!(channel = %self.config.channel_id, "Channel is not live");
                self.events
                    .emit(SupervisorEvent::Probed(ProbeOutcome::Offline));
                Some(Ok(LiveStatus::Offline))
            }
            Err(e) => {
                warn!(channel = %self.config.channel_id, error = %e, "Live status check failed, treating as not live");
                self.events
                    .emit(SupervisorEvent::Probed(ProbeOutcome::Failed(e.to_string())));
                Some(Err(e))
            }
        }
    }

    async fn capture(&mut self, stream: LiveStream) -> Result<CaptureResult> {
        let output = self.namer.next_path(&stream);

        let mut session = match self.launcher.launch(&stream, &output).await {
            Ok(session) => session,
            Err(e) => return self.on_launch_failure(e.to_string()),
        };

        self.state.phase = SupervisorPhase::Capturing;
        self.state.sessions_started += 1;
        info!(
            output = %output.display(),
            pid = session.pid(),
            "Capture started"
        );
        self.events.emit(SupervisorEvent::CaptureStarted {
            output: output.clone(),
            title: stream.title.clone(),
        });

        let outcome = {
            let retention_interval = self.retention.interval();
            // An interval too long to schedule simply never ticks.
            let mut retention_tick = tokio::time::Instant::now()
                .checked_add(retention_interval)
                .map(|start| tokio::time::interval_at(start, retention_interval));
            let wait = session.wait_for_exit(&self.shutdown, self.config.shutdown_grace);
            tokio::pin!(wait);

            loop {
                tokio::select! {
                    biased;
                    outcome = &mut wait => break outcome,
                    // The session is still terminating the child at this point.
                    _ = self.shutdown.cancelled(), if self.state.phase != SupervisorPhase::ShuttingDown => {
                        mark_shutdown(&mut self.state, &self.events);
                    }
                    _ = next_tick(retention_tick.as_mut()) => {
                        retention_pass(&self.retention, &self.events, Some(&output)).await;
                    }
                }
            }
        };

        let bytes = session.output_size().await;
        drop(session);

        info!(
            output = %output.display(),
            %outcome,
            bytes,
            "Capture finished"
        );
        self.events.emit(SupervisorEvent::CaptureFinished {
            output: output.clone(),
            outcome,
            bytes,
        });

        let result = match outcome {
            ExitOutcome::Killed => return Ok(CaptureResult::Shutdown),
            ExitOutcome::Completed if bytes == 0 => {
                // Nothing recorded: wait a full interval instead of relaunching at once.
                warn!(output = %output.display(), "Capture exited cleanly without writing any output");
                self.state.record_success();
                CaptureResult::StreamEnded
            }
            ExitOutcome::Completed => {
                self.state.record_success();
                CaptureResult::Completed
            }
            ExitOutcome::FailedWithCode(code) if bytes == 0 => {
                match self.probe().await {
                    None => return Ok(CaptureResult::Shutdown),
                    Some(Ok(LiveStatus::Offline)) => {
                        info!(code, "Capture exited without output because the stream ended");
                        self.state.record_success();
                        CaptureResult::StreamEnded
                    }
                    Some(_) => {
                        return self.on_launch_failure(format!(
                            "capture exited with code {code} without writing any output"
                        ));
                    }
                }
            }
            ExitOutcome::FailedWithCode(code) => {
                self.state.record_launch_success();
                self.classify_nonzero_exit(code).await
            }
        };

        if result == CaptureResult::Shutdown {
            return Ok(result);
        }

        self.last_retention = Instant::now();
        retention_pass(&self.retention, &self.events, None).await;
        Ok(result)
    }

    /// Re-probe after a nonzero exit: offline means the stream simply ended.
    async fn classify_nonzero_exit(&mut self, code: i32) -> CaptureResult {
        match self.probe().await {
            None => CaptureResult::Shutdown,
            Some(Ok(LiveStatus::Offline)) => {
                info!(code, "Capture exited with an error after the stream ended");
                self.state.record_success();
                CaptureResult::StreamEnded
            }
            Some(Ok(LiveStatus::Live(_))) | Some(Err(_)) => {
                self.state.record_runtime_failure();
                error!(
                    code,
                    failures = self.state.consecutive_failures,
                    "Capture failed while the channel may still be live"
                );
                CaptureResult::Failed
            }
        }
    }

    fn on_launch_failure(&mut self, message: String) -> Result<CaptureResult> {
        self.state.record_launch_failure();
        let attempt = self.state.consecutive_launch_failures;
        error!(
            attempt,
            retry_count = self.config.retry_count,
            "Capture launch failed: {}",
            message
        );
        self.events.emit(SupervisorEvent::LaunchFailed {
            attempt,
            error: message.clone(),
        });

        if attempt >= self.config.retry_count {
            error!(
                attempts = attempt,
                "Capture launch failed too many times in a row, giving up"
            );
            return Err(Error::LaunchExhausted {
                attempts: attempt,
                last_error: message,
            });
        }
        Ok(CaptureResult::Failed)
    }

    /// A confirmed offline channel closes the broadcast; earlier failures no
    /// longer count toward the retry limit.
    fn clear_failures_on_offline(&mut self) {
        if self.state.consecutive_failures > 0 || self.state.consecutive_launch_failures > 0 {
            info!(
                failures = self.state.consecutive_failures,
                "Channel is offline, clearing failure counters"
            );
            self.state.record_success();
        }
    }

    fn next_delay(&self) -> Duration {
        let delay = self.state.next_delay(&self.config);
        let failures = self.state.consecutive_failures;
        if failures > 0 {
            info!(
                failures,
                delay_secs = delay.as_secs_f64(),
                "Retrying after failure"
            );
            self.events
                .emit(SupervisorEvent::BackoffScheduled { failures, delay });
        } else {
            debug!(delay_secs = delay.as_secs_f64(), "Next check scheduled");
        }
        delay
    }

    /// Sleep for `delay`; `false` when shutdown interrupted the sleep.
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn retention_if_due(&mut self) {
        if self.last_retention.elapsed() >= self.retention.interval() {
            self.last_retention = Instant::now();
            retention_pass(&self.retention, &self.events, None).await;
        }
    }

    fn enter_shutdown(&mut self) {
        if self.state.phase != SupervisorPhase::ShuttingDown {
            mark_shutdown(&mut self.state, &self.events);
        }
    }
}

fn mark_shutdown(state: &mut SupervisorState, events: &EventSink) {
    state.phase = SupervisorPhase::ShuttingDown;
    info!("Shutdown requested, stopping supervisor");
    events.emit(SupervisorEvent::ShutdownRequested);
}

async fn next_tick(tick: Option<&mut tokio::time::Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn retention_pass(retention: &RetentionManager, events: &EventSink, active: Option<&Path>) {
    if !retention.is_enabled() {
        return;
    }
    match retention.enforce(active).await {
        Ok(deleted) => events.emit(SupervisorEvent::RetentionApplied { deleted }),
        Err(e) => warn!(error = %e, "Retention pass failed"),
    }
}

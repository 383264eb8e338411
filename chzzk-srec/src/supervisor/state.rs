//! Supervisor state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::service::SupervisorConfig;

/// Phase of the supervisor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SupervisorPhase {
    #[default]
    Idle,
    Probing,
    Capturing,
    ShuttingDown,
    Stopped,
}

/// Counters and phase owned by the supervisor loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorState {
    pub phase: SupervisorPhase,
    /// Capture failures (launch or runtime) since the last clean completion.
    pub consecutive_failures: u32,
    /// Launch failures since the last successful launch.
    pub consecutive_launch_failures: u32,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub sessions_started: u64,
}

impl SupervisorState {
    /// A capture completed cleanly or the stream ended normally.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_launch_failures = 0;
    }

    /// The capture process ran and produced output.
    pub fn record_launch_success(&mut self) {
        self.consecutive_launch_failures = 0;
    }

    pub fn record_launch_failure(&mut self) {
        self.consecutive_launch_failures += 1;
        self.consecutive_failures += 1;
    }

    pub fn record_runtime_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Delay before the next probe.
    ///
    /// No failures: the poll interval. Fewer failures than the retry count: the
    /// quick retry delay. Otherwise the backoff curve, starting at attempt 0.
    pub fn next_delay(&self, config: &SupervisorConfig) -> Duration {
        let failures = self.consecutive_failures;
        if failures == 0 {
            config.poll_interval
        } else if failures < config.retry_count {
            config.retry_delay
        } else {
            config
                .backoff
                .delay_for_attempt(failures - config.retry_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackoffPolicy, BackoffStrategy};

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            channel_id: "abc123".to_string(),
            poll_interval: Duration::from_secs(60),
            retry_count: 3,
            retry_delay: Duration::from_secs(5),
            backoff: BackoffPolicy::new(
                BackoffStrategy::Exponential,
                Duration::from_secs(60),
                Duration::from_secs(600),
            ),
            shutdown_grace: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_delay_progression() {
        let config = config();
        let mut state = SupervisorState::default();
        assert_eq!(state.next_delay(&config), Duration::from_secs(60));

        let expected = [5, 5, 60, 120, 240, 480, 600, 600];
        for secs in expected {
            state.record_runtime_failure();
            assert_eq!(state.next_delay(&config), Duration::from_secs(secs));
        }
    }

    #[test]
    fn test_success_resets_counters() {
        let mut state = SupervisorState::default();
        state.record_launch_failure();
        state.record_runtime_failure();
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.consecutive_launch_failures, 1);

        state.record_launch_success();
        assert_eq!(state.consecutive_launch_failures, 0);
        assert_eq!(state.consecutive_failures, 2);

        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
    }
}

//! Child process supervision with cancellation support.

use std::time::Duration;

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::downloader::engine::ExitOutcome;

/// Wait for `child` to exit, or terminate it once `shutdown` is cancelled.
///
/// On shutdown the child receives SIGTERM, gets `grace` to exit on its own and
/// is then killed. The child is always reaped before this returns.
pub async fn wait_for_exit(
    child: &mut Child,
    shutdown: &CancellationToken,
    grace: Duration,
) -> ExitOutcome {
    tokio::select! {
        status = child.wait() => match status {
            Ok(exit_status) => match exit_status.code() {
                Some(0) => ExitOutcome::Completed,
                Some(code) => {
                    warn!("Process exited with code: {}", code);
                    ExitOutcome::FailedWithCode(code)
                }
                None => {
                    warn!("Process terminated by signal: {}", exit_status);
                    ExitOutcome::FailedWithCode(-1)
                }
            },
            Err(e) => {
                error!("Error waiting for process: {}", e);
                ExitOutcome::FailedWithCode(-1)
            }
        },
        _ = shutdown.cancelled() => {
            terminate_gracefully(child, grace).await;
            ExitOutcome::Killed
        }
    }
}

/// Ask `child` to stop, escalating to a kill after `grace`.
///
/// Returns `true` when the child exited within the grace period.
pub async fn terminate_gracefully(child: &mut Child, grace: Duration) -> bool {
    let Some(pid) = child.id() else {
        // Already reaped.
        return true;
    };

    if let Err(e) = process_utils::terminate(pid) {
        if e.kind() == std::io::ErrorKind::NotFound {
            debug!(pid, "Process already gone before termination signal");
        } else {
            warn!(pid, error = %e, "Failed to send termination signal; killing process");
            kill_and_reap(child).await;
            return false;
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid, %status, "Process exited after termination signal");
            true
        }
        Ok(Err(e)) => {
            error!(pid, error = %e, "Error waiting for terminated process");
            kill_and_reap(child).await;
            false
        }
        Err(_) => {
            warn!(
                pid,
                grace_secs = grace.as_secs_f64(),
                "Process did not exit within the shutdown grace period; killing it"
            );
            kill_and_reap(child).await;
            false
        }
    }
}

async fn kill_and_reap(child: &mut Child) {
    // `kill` sends SIGKILL and waits for the exit status.
    if let Err(e) = child.kill().await {
        error!(error = %e, "Failed to kill process");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Child {
        process_utils::tokio_command("sh")
            .args(["-c", script])
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_exit_codes_are_classified() {
        let token = CancellationToken::new();
        let grace = Duration::from_secs(1);

        let mut ok = sh("exit 0");
        assert_eq!(wait_for_exit(&mut ok, &token, grace).await, ExitOutcome::Completed);

        let mut failed = sh("exit 7");
        assert_eq!(
            wait_for_exit(&mut failed, &token, grace).await,
            ExitOutcome::FailedWithCode(7)
        );
    }

    #[tokio::test]
    async fn test_shutdown_terminates_cooperative_child() {
        let token = CancellationToken::new();
        let mut child = sh("sleep 30");
        token.cancel();

        let started = Instant::now();
        let outcome = wait_for_exit(&mut child, &token, Duration::from_secs(5)).await;
        assert_eq!(outcome, ExitOutcome::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(child.try_wait().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_kills_child_ignoring_sigterm() {
        let token = CancellationToken::new();
        let mut child = sh("trap '' TERM; sleep 30 & wait");
        // Give the shell time to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();

        let grace = Duration::from_millis(300);
        let started = Instant::now();
        let outcome = wait_for_exit(&mut child, &token, grace).await;
        assert_eq!(outcome, ExitOutcome::Killed);
        assert!(started.elapsed() < grace + Duration::from_secs(2));
        assert!(child.try_wait().unwrap().is_some());
    }
}

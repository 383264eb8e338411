//! Translate OS termination signals into cancellation.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{Error, Result};

/// Which signal arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let term = signal(SignalKind::terminate())
            .map_err(|e| Error::Other(format!("SIGTERM handler failed: {e}")))?;
        Ok(Self { term })
    }

    async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = self.term.recv() => ShutdownSignal::Terminate,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> ShutdownSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    }
}

/// Cancel `token` on the first SIGINT/SIGTERM (Ctrl+C on Windows).
///
/// Further signals are only logged; the supervisor finishes terminating the
/// capture on its own schedule.
pub fn spawn_signal_listener(token: CancellationToken) -> Result<JoinHandle<()>> {
    let mut signals = Signals::install()?;

    Ok(tokio::spawn(async move {
        loop {
            let signal = signals.recv().await;
            if token.is_cancelled() {
                warn!(%signal, "Shutdown already in progress, waiting for capture to stop");
            } else {
                info!(%signal, "Received shutdown signal");
                token.cancel();
            }
        }
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_cancels_token() {
        let token = CancellationToken::new();
        let handle = spawn_signal_listener(token.clone()).unwrap();

        process_utils::terminate(std::process::id()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("token should be cancelled by SIGTERM");

        handle.abort();
    }
}

//! Streamlink capture engine.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, error, info, warn};

use super::traits::{CaptureLauncher, CaptureSession};
use super::utils::ensure_output_dir;
use crate::config::{Credentials, StreamlinkConfig};
use crate::monitor::LiveStream;
use crate::{Error, Result};

/// Arguments always passed before user-supplied extras.
const BASE_ARGS: &[&str] = &[
    "--ffmpeg-copyts",
    "--progress",
    "no",
    "--retry-streams",
    "3",
    "--retry-open",
    "3",
];

/// Streamlink-based capture engine.
///
/// Streamlink resolves the channel page itself and writes the remuxed stream
/// straight to the output file.
pub struct StreamlinkEngine {
    config: StreamlinkConfig,
    credentials: Credentials,
}

impl StreamlinkEngine {
    pub fn new(config: StreamlinkConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Detect the streamlink version, `None` when the binary cannot be run.
    pub async fn detect_version(&self) -> Option<String> {
        let mut cmd = process_utils::tokio_command(&self.config.binary_path);
        cmd.arg("--version");
        let output = cmd.output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Build streamlink command arguments.
    fn build_args(&self, stream_url: &str, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();

        args.extend(self.config.extra_args.iter().cloned());

        // Stream URL must be the first positional argument followed by quality
        args.push(stream_url.to_string());
        args.push(self.config.quality.clone());

        for (name, value) in self.credentials.cookie_pairs() {
            args.extend(["--http-cookie".to_string(), format!("{name}={value}")]);
        }

        args.extend(["--output".to_string(), output.to_string_lossy().into_owned()]);
        args
    }

    /// Parse streamlink output for status information.
    fn parse_streamlink_output(line: &str) -> Option<StreamlinkStatus> {
        if line.contains("[cli][info] Stream ended") {
            return Some(StreamlinkStatus::StreamEnded);
        }
        if line.contains("[cli][info] Opening stream") {
            return Some(StreamlinkStatus::StreamOpened);
        }
        if line.contains("[cli][error]") || line.contains("error: ") {
            return Some(StreamlinkStatus::Error(line.to_string()));
        }
        None
    }

    /// Drain one of the child's pipes, logging recognized status lines.
    fn spawn_output_monitor<R>(reader: R, channel_id: String)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match Self::parse_streamlink_output(&line) {
                        Some(StreamlinkStatus::StreamOpened) => {
                            info!(channel = %channel_id, "Streamlink stream opened");
                        }
                        Some(StreamlinkStatus::StreamEnded) => {
                            info!(channel = %channel_id, "Streamlink stream ended");
                        }
                        Some(StreamlinkStatus::Error(err)) => {
                            warn!(channel = %channel_id, "Streamlink error: {}", err);
                        }
                        None => debug!(channel = %channel_id, "streamlink: {}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading streamlink output: {}", e);
                        break;
                    }
                }
            }
        });
    }
}

/// Status parsed from streamlink output.
#[derive(Debug, PartialEq)]
enum StreamlinkStatus {
    StreamOpened,
    StreamEnded,
    Error(String),
}

#[async_trait]
impl CaptureLauncher for StreamlinkEngine {
    fn name(&self) -> &str {
        "streamlink"
    }

    async fn launch(&self, stream: &LiveStream, output: &Path) -> Result<CaptureSession> {
        if let Some(dir) = output.parent() {
            ensure_output_dir(dir).await?;
        }

        let args = self.build_args(&stream.stream_url, output);
        info!(
            channel = %stream.channel_id,
            output = %output.display(),
            "Starting streamlink capture"
        );

        let mut command = process_utils::tokio_command(&self.config.binary_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn().map_err(|e| {
            Error::launch(format!(
                "failed to spawn {}: {}",
                self.config.binary_path, e
            ))
        })?;

        if let Some(stdout) = child.stdout.take() {
            Self::spawn_output_monitor(stdout, stream.channel_id.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            Self::spawn_output_monitor(stderr, stream.channel_id.clone());
        }

        Ok(CaptureSession::new(child, output))
    }
}

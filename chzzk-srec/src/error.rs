//! Application-wide error types.

use std::path::{Path, PathBuf};

use platforms_parser::extractor::error::ExtractorError;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid setting. Fatal at startup, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The channel metadata source could not be queried.
    #[error("Probe failed: {0}")]
    Probe(#[from] ExtractorError),

    /// The capture tool could not be started (or died before writing anything).
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Launch failures reached the configured retry count.
    #[error("Capture launch failed {attempts} consecutive times, giving up: {last_error}")]
    LaunchExhausted { attempts: u32, last_error: String },

    /// Another live instance owns the PID file.
    #[error("Another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// `stop`/`status` found no running instance.
    #[error("Recorder is not running: {0}")]
    NotRunning(String),

    #[error("IO error while {op} {path}: {source}")]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Process exit status for errors that terminate the recorder.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::LaunchExhausted { .. } => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_have_distinct_exit_codes() {
        assert_eq!(Error::config("missing CHANNEL_ID").exit_code(), 2);
        let exhausted = Error::LaunchExhausted {
            attempts: 3,
            last_error: "not found".into(),
        };
        assert_eq!(exhausted.exit_code(), 3);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
        assert_eq!(Error::AlreadyRunning { pid: 42 }.exit_code(), 1);
        assert_eq!(Error::NotRunning("no pid file".into()).exit_code(), 1);
    }

    #[test]
    fn io_path_mentions_operation_and_path() {
        let err = Error::io_path(
            "creating output directory",
            Path::new("/tmp/rec"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let msg = err.to_string();
        assert!(msg.contains("creating output directory"));
        assert!(msg.contains("/tmp/rec"));
    }
}

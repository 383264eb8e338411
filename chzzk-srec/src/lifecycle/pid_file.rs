//! PID marker file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::utils::fs::ensure_parent_dir_sync;
use crate::{Error, Result};

/// What the PID file says about the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "pid", rename_all = "snake_case")]
pub enum InstanceState {
    /// No PID file.
    NotRunning,
    /// PID file points at a process that no longer exists.
    Stale(u32),
    Running(u32),
}

/// Read the PID stored at `path`, `None` when the file does not exist.
pub fn read_pid(path: &Path) -> Result<Option<u32>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_path("reading pid file", path, e)),
    };

    content.trim().parse::<u32>().map(Some).map_err(|_| {
        Error::Other(format!(
            "pid file {} is corrupt: '{}'",
            path.display(),
            content.trim()
        ))
    })
}

pub fn inspect(path: &Path) -> Result<InstanceState> {
    Ok(match read_pid(path)? {
        None => InstanceState::NotRunning,
        Some(pid) if process_utils::is_alive(pid) => InstanceState::Running(pid),
        Some(pid) => InstanceState::Stale(pid),
    })
}

/// Remove the PID file if present.
pub fn remove(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_path("removing pid file", path, e)),
    }
}

/// PID file owned by the running recorder; removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Write the current process id to `path`.
    ///
    /// Fails with [`Error::AlreadyRunning`] when another live process owns the
    /// file. A stale file is overwritten.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pid = std::process::id();

        match inspect(&path) {
            Ok(InstanceState::Running(other)) if other != pid => {
                return Err(Error::AlreadyRunning { pid: other });
            }
            Ok(InstanceState::Stale(old)) => {
                warn!(pid = old, path = %path.display(), "Overwriting stale pid file");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable pid file"),
        }

        ensure_parent_dir_sync("creating pid file directory", &path)?;
        let tmp = path.with_extension("pid.tmp");
        std::fs::write(&tmp, format!("{pid}\n"))
            .map_err(|e| Error::io_path("writing pid file", &tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::io_path("writing pid file", &path, e))?;

        debug!(pid, path = %path.display(), "Wrote pid file");
        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // Leave the file alone if another instance has taken it over.
        if matches!(read_pid(&self.path), Ok(Some(pid)) if pid == self.pid)
            && let Err(e) = remove(&self.path)
        {
            warn!(error = %e, "Failed to remove pid file");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// PID of an exited, reaped child: guaranteed not alive.
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        pid
    }

    #[test]
    fn test_acquire_writes_and_drop_removes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run").join("rec.pid");

        let pid_file = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(std::process::id()));
        assert_eq!(pid_file.path(), path);
        assert_eq!(
            inspect(&path).unwrap(),
            InstanceState::Running(std::process::id())
        );

        drop(pid_file);
        assert!(!path.exists());
        assert_eq!(inspect(&path).unwrap(), InstanceState::NotRunning);
    }

    #[test]
    fn test_stale_pid_file_is_overwritten() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rec.pid");
        let stale = dead_pid();
        std::fs::write(&path, format!("{stale}\n")).unwrap();
        assert_eq!(inspect(&path).unwrap(), InstanceState::Stale(stale));

        let _pid_file = PidFile::acquire(&path).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(std::process::id()));
    }

    #[test]
    fn test_live_owner_is_refused() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rec.pid");
        let mut owner = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(&path, owner.id().to_string()).unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { pid } if pid == owner.id()));

        owner.kill().unwrap();
        owner.wait().unwrap();
    }

    #[test]
    fn test_corrupt_pid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rec.pid");
        std::fs::write(&path, "not-a-pid").unwrap();
        assert!(read_pid(&path).is_err());
        remove(&path).unwrap();
        remove(&path).unwrap();
    }
}

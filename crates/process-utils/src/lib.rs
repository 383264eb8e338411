//! Small process-related helpers shared across the workspace.
//!
//! Besides command construction, this crate owns the signal plumbing used to
//! stop a capture child (or a running recorder instance) gracefully:
//! [`terminate`] asks a process to exit, [`force_kill`] does not ask, and
//! [`is_alive`] checks whether a pid still refers to a live process.

use std::ffi::OsStr;
use std::io;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `std::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
///
/// The child is killed if its handle is dropped, so a supervisor that loses
/// track of a capture never leaves an orphan writing to disk.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd.kill_on_drop(true);
    cmd
}

#[cfg(unix)]
fn to_pid(pid: u32) -> io::Result<nix::unistd::Pid> {
    // 0 would address the caller's whole process group.
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(nix::unistd::Pid::from_raw(raw)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid pid {pid}"),
        )),
    }
}

/// Ask a process to terminate (`SIGTERM`).
///
/// Returns `Ok(())` if the signal was delivered. A process that already
/// exited yields an error of kind [`io::ErrorKind::NotFound`].
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<()> {
    send(pid, nix::sys::signal::Signal::SIGTERM)
}

/// Forcefully kill a process (`SIGKILL`).
#[cfg(unix)]
pub fn force_kill(pid: u32) -> io::Result<()> {
    send(pid, nix::sys::signal::Signal::SIGKILL)
}

#[cfg(unix)]
fn send(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::errno::Errno;

    match nix::sys::signal::kill(to_pid(pid)?, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no process with pid {pid}"),
        )),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Check whether `pid` refers to a running process.
///
/// A process owned by another user (`EPERM`) still counts as alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::errno::Errno;

    let Ok(pid) = to_pid(pid) else {
        return false;
    };
    match nix::sys::signal::kill(pid, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("graceful termination of pid {pid} is not supported on this platform"),
    ))
}

#[cfg(not(unix))]
pub fn force_kill(pid: u32) -> io::Result<()> {
    let status = std_command("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill failed for pid {pid}")))
    }
}

#[cfg(not(unix))]
pub fn is_alive(pid: u32) -> bool {
    std_command("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn out_of_range_pid_is_not_alive() {
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
        assert_eq!(
            terminate(u32::MAX).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[tokio::test]
    async fn terminate_stops_a_sleeping_child() {
        let mut child = tokio_command("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap();
        assert!(is_alive(pid));

        terminate(pid).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
        assert!(status.code().is_none());
    }

    #[tokio::test]
    async fn signalling_a_reaped_child_reports_not_found() {
        let mut child = tokio_command("true").spawn().unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        let err = force_kill(pid).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

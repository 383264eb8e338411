//! Process lifecycle: PID marker file and the `stop`/`status` commands.

mod commands;
pub mod pid_file;

pub use commands::{StatusReport, StopOutcome, status, stop};
pub use pid_file::{InstanceState, PidFile};

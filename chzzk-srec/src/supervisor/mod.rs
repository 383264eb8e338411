//! Recording supervisor.
//!
//! The supervisor is the single thread of control of the recorder. It polls the
//! prober, launches at most one capture at a time, classifies how each capture
//! ended and decides how long to wait before the next probe.
//!
//! # State machine
//!
//! ```text
//! Idle --delay--> Probing --live--> Capturing --exit--> Idle
//!                    |                                   ^
//!                    +--------offline / probe error------+
//!
//! any --shutdown--> ShuttingDown --> Stopped
//! ```

mod events;
mod service;
mod state;

pub use events::{ProbeOutcome, SupervisorEvent};
pub use service::{Supervisor, SupervisorConfig};
pub use state::{SupervisorPhase, SupervisorState};

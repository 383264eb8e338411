//! Capture engine abstraction.
//!
//! This module defines the `CaptureLauncher` trait and the session types
//! shared by capture backends.

mod streamlink;
mod traits;
pub mod utils;

pub use streamlink::StreamlinkEngine;
pub use traits::{CaptureLauncher, CaptureSession, CaptureStatus, ExitOutcome};

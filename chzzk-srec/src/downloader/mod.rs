//! Capture launching and output naming.

pub mod engine;
mod naming;

pub use engine::{
    CaptureLauncher, CaptureSession, CaptureStatus, ExitOutcome, StreamlinkEngine,
};
pub use naming::OutputNamer;

//! Channel availability probing.
//!
//! The prober answers one question, "is the channel live right now?", and never
//! mutates anything. Probe failures are transient: the supervisor treats them
//! as "not live, retry later".

mod detector;

pub use detector::{ChzzkProber, LiveProber, LiveStatus, LiveStream};

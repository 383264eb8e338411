//! chzzk-srec library crate.
//!
//! Automatic recorder for a single Chzzk channel. The binary wires these
//! modules together; they are exposed for integration testing.

pub mod config;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod panic_hook;
pub mod retention;
pub mod shutdown;
pub mod supervisor;
pub mod utils;

pub use error::{Error, Result};

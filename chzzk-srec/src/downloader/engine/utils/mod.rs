//! Utility modules for capture engines.

mod files;
mod process_runner;

pub use files::{ensure_output_dir, file_size};
pub use process_runner::{terminate_gracefully, wait_for_exit};

//! File utility functions for capture engines.

use std::path::Path;

use crate::Result;
use crate::utils::fs;

/// Ensure the output directory exists, creating it if necessary.
pub async fn ensure_output_dir(path: &Path) -> Result<()> {
    fs::ensure_dir_all_with_op("creating output directory", path).await
}

/// Size of `path` in bytes, or `None` when it does not exist.
pub async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

//! Filesystem helpers with operation + path error context.

use std::path::Path;

use crate::{Error, Result};

/// Create `path` and its parents if needed.
pub async fn ensure_dir_all_with_op(op: &'static str, path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_path(op, path, e))
}

/// Synchronous variant of [`ensure_dir_all_with_op`], for startup paths.
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

/// Ensure the parent directory of a file path exists.
pub fn ensure_parent_dir_sync(op: &'static str, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_all_sync_with_op(op, parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        ensure_dir_all_with_op("creating test directory", &nested)
            .await
            .unwrap();
        assert!(nested.is_dir());
        // Existing directory is fine.
        ensure_dir_all_with_op("creating test directory", &nested)
            .await
            .unwrap();
    }

    #[test]
    fn test_parent_of_bare_filename_is_ignored() {
        ensure_parent_dir_sync("creating pid directory", Path::new("rec.pid")).unwrap();
    }

    #[test]
    fn test_error_carries_operation() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let err = ensure_dir_all_sync_with_op("creating log directory", &file.join("sub"))
            .unwrap_err();
        assert!(err.to_string().contains("creating log directory"));
    }
}

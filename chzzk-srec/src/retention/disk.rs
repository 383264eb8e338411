//! Disk usage of the filesystem holding the recordings.

use std::path::Path;

use serde::Serialize;
use sysinfo::Disks;

use crate::{Error, Result};

/// Space figures for one filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Get the percentage of space used.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes() as f64 / self.total_bytes as f64) * 100.0
        }
    }
}

/// Source of disk usage figures.
pub trait DiskUsageProbe: Send + Sync + 'static {
    fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// [`DiskUsageProbe`] backed by `sysinfo`.
///
/// The disk is the one with the longest mount point containing the
/// canonicalized path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoDiskProbe;

impl DiskUsageProbe for SysinfoDiskProbe {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        let path = path
            .canonicalize()
            .map_err(|e| Error::io_path("resolving recording directory", path, e))?;
        let disks = Disks::new_with_refreshed_list();

        let mut best_match: Option<(&sysinfo::Disk, usize)> = None;
        for disk in disks.list() {
            let mount_point = disk.mount_point();
            if path.starts_with(mount_point) {
                let depth = mount_point.components().count();
                if best_match.is_none_or(|(_, best)| depth > best) {
                    best_match = Some((disk, depth));
                }
            }
        }

        best_match
            .map(|(disk, _)| DiskUsage {
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .ok_or_else(|| Error::Other(format!("no disk found for {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_percent() {
        let usage = DiskUsage {
            total_bytes: 1000,
            available_bytes: 250,
        };
        assert_eq!(usage.used_bytes(), 750);
        assert_eq!(usage.used_percent(), 75.0);

        let empty = DiskUsage {
            total_bytes: 0,
            available_bytes: 0,
        };
        assert_eq!(empty.used_percent(), 0.0);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let err = SysinfoDiskProbe
            .usage(Path::new("/nonexistent/recordings"))
            .unwrap_err();
        assert!(matches!(err, Error::IoPath { .. }));
    }
}

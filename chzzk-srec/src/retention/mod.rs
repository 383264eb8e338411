//! Retention of completed recordings.
//!
//! Two rules, each disabled by a zero setting:
//! - age: recordings older than `retention_days` are deleted;
//! - disk: while the filesystem is fuller than `max_disk_usage_percent`,
//!   recordings are deleted oldest first.
//!
//! The recording currently being written is never touched.

mod disk;

pub use disk::{DiskUsage, DiskUsageProbe, SysinfoDiskProbe};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;
use crate::{Error, Result};

/// A finished recording on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingArtifact {
    pub path: PathBuf,
    /// Last modification time, i.e. when the capture stopped writing.
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Aggregate figures reported by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageSummary {
    pub recordings: usize,
    pub total_bytes: u64,
    pub disk: Option<DiskUsage>,
}

pub struct RetentionManager {
    output_dir: PathBuf,
    extension: String,
    config: RetentionConfig,
    disk: Arc<dyn DiskUsageProbe>,
}

impl RetentionManager {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        config: RetentionConfig,
        disk: Arc<dyn DiskUsageProbe>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into().to_lowercase(),
            config,
            disk,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.config.retention_days > 0 || self.config.max_disk_usage_percent > 0
    }

    /// Recordings in the output directory, oldest first.
    pub async fn list_artifacts(&self) -> Result<Vec<RecordingArtifact>> {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::io_path(
                    "reading recording directory",
                    &self.output_dir,
                    e,
                ));
            }
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_path("reading recording directory", &self.output_dir, e))?
        {
            let path = entry.path();
            if !self.is_recording(&path) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            artifacts.push(RecordingArtifact {
                path,
                created_at: DateTime::<Utc>::from(modified),
                size: metadata.len(),
            });
        }

        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.path.cmp(&b.path)));
        Ok(artifacts)
    }

    fn is_recording(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// Apply both rules once and return the number of deleted recordings.
    ///
    /// `active` is the file of the running capture, if any; it is excluded from
    /// both rules.
    pub async fn enforce(&self, active: Option<&Path>) -> Result<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let mut artifacts = self.list_artifacts().await?;
        if let Some(active) = active {
            artifacts.retain(|a| !is_same_file(&a.path, active));
        }

        let mut deleted = 0;

        // A limit reaching past the earliest representable date expires nothing.
        let cutoff = chrono::TimeDelta::try_days(i64::from(self.config.retention_days))
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if let Some(cutoff) = cutoff.filter(|_| self.config.retention_days > 0) {
            let (expired, kept): (Vec<_>, Vec<_>) =
                artifacts.into_iter().partition(|a| a.created_at < cutoff);
            artifacts = kept;

            for artifact in expired {
                if remove_artifact(&artifact, "older than retention period").await {
                    deleted += 1;
                }
            }
        }

        if self.config.max_disk_usage_percent > 0 {
            deleted += self.enforce_disk_usage(artifacts).await;
        }

        if deleted > 0 {
            info!(count = deleted, dir = %self.output_dir.display(), "Retention removed recordings");
        }
        Ok(deleted)
    }

    async fn enforce_disk_usage(&self, artifacts: Vec<RecordingArtifact>) -> usize {
        let usage = match self.disk.usage(&self.output_dir) {
            Ok(usage) => usage,
            Err(e) => {
                warn!(error = %e, "Could not determine disk usage; skipping disk retention");
                return 0;
            }
        };

        let limit = usage.total_bytes as u128 * u128::from(self.config.max_disk_usage_percent) / 100;
        let mut used = usage.used_bytes();
        if u128::from(used) <= limit {
            return 0;
        }

        info!(
            used_percent = usage.used_percent(),
            threshold_percent = self.config.max_disk_usage_percent,
            "Disk usage above threshold, removing oldest recordings"
        );

        let mut deleted = 0;
        for artifact in artifacts {
            if u128::from(used) <= limit {
                break;
            }
            if remove_artifact(&artifact, "disk usage above threshold").await {
                used = used.saturating_sub(artifact.size);
                deleted += 1;
            }
        }

        if u128::from(used) > limit {
            warn!("Disk usage still above threshold after removing all eligible recordings");
        }
        deleted
    }

    /// Recording count, total size and disk usage.
    pub async fn summary(&self) -> Result<StorageSummary> {
        let artifacts = self.list_artifacts().await?;
        let disk = if self.output_dir.exists() {
            self.disk.usage(&self.output_dir).ok()
        } else {
            None
        };
        Ok(StorageSummary {
            recordings: artifacts.len(),
            total_bytes: artifacts.iter().map(|a| a.size).sum(),
            disk,
        })
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn remove_artifact(artifact: &RecordingArtifact, reason: &str) -> bool {
    match tokio::fs::remove_file(&artifact.path).await {
        Ok(()) => {
            info!(
                path = %artifact.path.display(),
                size = artifact.size,
                created_at = %artifact.created_at,
                "Deleted recording ({})",
                reason
            );
            true
        }
        Err(e) => {
            warn!(path = %artifact.path.display(), error = %e, "Failed to delete recording");
            false
        }
    }
}

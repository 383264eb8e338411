//! Output file naming.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::monitor::LiveStream;
use crate::utils::filename::sanitize_component;

/// Byte limits keep the full name well under the usual 255-byte cap.
const MAX_CHANNEL_BYTES: usize = 64;
const MAX_TITLE_BYTES: usize = 120;

/// Issues unique recording paths of the form
/// `{YYYYmmdd-HHMMSS}_{channel}_{title}.{ext}`.
///
/// A name already issued by this namer or already present on disk gets a
/// `_{n}` suffix, so two sessions never share an output file.
#[derive(Debug)]
pub struct OutputNamer {
    output_dir: PathBuf,
    extension: String,
    issued: HashSet<PathBuf>,
}

impl OutputNamer {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            issued: HashSet::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Next path for `stream`, stamped with the current local time.
    pub fn next_path(&mut self, stream: &LiveStream) -> PathBuf {
        self.next_path_at(stream, Local::now())
    }

    pub fn next_path_at(&mut self, stream: &LiveStream, at: DateTime<Local>) -> PathBuf {
        let stem = format!(
            "{}_{}_{}",
            at.format("%Y%m%d-%H%M%S"),
            sanitize_component(&stream.channel_name, MAX_CHANNEL_BYTES),
            sanitize_component(&stream.title, MAX_TITLE_BYTES),
        );

        let mut candidate = self.path_for(&stem);
        let mut n = 1u32;
        while self.issued.contains(&candidate) || candidate.exists() {
            candidate = self.path_for(&format!("{stem}_{n}"));
            n += 1;
        }

        self.issued.insert(candidate.clone());
        candidate
    }

    fn path_for(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.{}", self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn stream(title: &str) -> LiveStream {
        LiveStream {
            channel_id: "abc123".to_string(),
            channel_name: "스트리머".to_string(),
            title: title.to_string(),
            category: None,
            opened_at: None,
            stream_url: "https://chzzk.naver.com/live/abc123".to_string(),
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 21, 3, 9).unwrap()
    }

    fn file_name(path: &Path) -> &str {
        path.file_name().unwrap().to_str().unwrap()
    }

    #[test]
    fn test_name_layout_and_sanitization() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path(), "mp4");
        let path = namer.next_path_at(&stream("new/game: day 1?"), at());

        assert_eq!(path.parent(), Some(temp.path()));
        assert_eq!(file_name(&path), "20240501-210309_스트리머_new_game_ day 1_.mp4");
    }

    #[test]
    fn test_same_second_names_are_distinct() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path(), "ts");

        let names: Vec<PathBuf> = (0..3)
            .map(|_| namer.next_path_at(&stream("same"), at()))
            .collect();
        assert_eq!(file_name(&names[0]), "20240501-210309_스트리머_same.ts");
        assert_eq!(file_name(&names[1]), "20240501-210309_스트리머_same_1.ts");
        assert_eq!(file_name(&names[2]), "20240501-210309_스트리머_same_2.ts");
    }

    #[test]
    fn test_existing_file_is_not_reused() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("20240501-210309_스트리머_same.mp4"), b"old").unwrap();

        let mut namer = OutputNamer::new(temp.path(), "mp4");
        let path = namer.next_path_at(&stream("same"), at());
        assert_eq!(file_name(&path), "20240501-210309_스트리머_same_1.mp4");
    }

    #[test]
    fn test_long_title_is_truncated() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path(), "mp4");
        let path = namer.next_path_at(&stream(&"가".repeat(200)), at());
        assert!(file_name(&path).len() < 255);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about a channel's current broadcast.
///
/// `stream_url` is the location handed to an external capture tool; it is only
/// meaningful when `is_live` is true.
///
/// ```rust
/// use platforms_parser::media::media_info::MediaInfo;
///
/// let media = MediaInfo::builder("https://chzzk.naver.com", "Sample Stream", "Sample Artist")
///     .category("Talk")
///     .is_live(true)
///     .stream_url("https://chzzk.naver.com/live/abc")
///     .build();
/// assert!(media.is_live);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MediaInfo {
    // Site of the media platform
    pub site_url: String,
    pub title: String,
    pub artist: String,
    pub category: Option<String>,
    pub live_start_time: Option<DateTime<Utc>>,
    pub artist_url: Option<String>,
    pub is_live: bool,
    pub stream_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaInfoBuilder {
    inner: MediaInfo,
}

impl MediaInfo {
    pub fn builder(
        site_url: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> MediaInfoBuilder {
        MediaInfoBuilder {
            inner: MediaInfo {
                site_url: site_url.into(),
                title: title.into(),
                artist: artist.into(),
                category: None,
                live_start_time: None,
                artist_url: None,
                is_live: false,
                stream_url: None,
            },
        }
    }

    /// Offline placeholder for a site.
    pub fn offline(site_url: impl Into<String>) -> Self {
        Self::builder(site_url, "", "").build()
    }
}

impl MediaInfoBuilder {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.inner.category = Some(category.into());
        self
    }

    pub fn maybe_category(mut self, category: Option<String>) -> Self {
        self.inner.category = category;
        self
    }

    pub fn live_start_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.inner.live_start_time = time;
        self
    }

    pub fn artist_url(mut self, url: impl Into<String>) -> Self {
        self.inner.artist_url = Some(url.into());
        self
    }

    pub fn is_live(mut self, is_live: bool) -> Self {
        self.inner.is_live = is_live;
        self
    }

    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.inner.stream_url = Some(url.into());
        self
    }

    pub fn build(self) -> MediaInfo {
        self.inner
    }
}

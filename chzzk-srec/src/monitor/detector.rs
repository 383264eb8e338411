//! Live status detection for the configured channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use platforms_parser::extractor::create_client_builder;
use platforms_parser::extractor::error::ExtractorError;
use platforms_parser::extractor::platform_extractor::PlatformExtractor;
use platforms_parser::extractor::platforms::chzzk::Chzzk;
use platforms_parser::media::MediaInfo;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::config::ChannelConfig;

/// A broadcast that is currently on air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStream {
    pub channel_id: String,
    pub channel_name: String,
    pub title: String,
    pub category: Option<String>,
    /// Broadcast start time reported by the platform.
    pub opened_at: Option<DateTime<Utc>>,
    /// Location handed to the capture tool.
    pub stream_url: String,
}

/// Live status of the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiveStatus {
    Live(LiveStream),
    Offline,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live(_))
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, LiveStatus::Offline)
    }

    /// Convert extracted media info into a status for `channel_id`.
    ///
    /// `fallback_url` is used when the platform did not report a stream URL.
    pub fn from_media_info(channel_id: &str, info: MediaInfo, fallback_url: &str) -> Self {
        if !info.is_live {
            return LiveStatus::Offline;
        }

        LiveStatus::Live(LiveStream {
            channel_id: channel_id.to_string(),
            channel_name: info.artist,
            title: info.title,
            category: info.category,
            opened_at: info.live_start_time,
            stream_url: info.stream_url.unwrap_or_else(|| fallback_url.to_string()),
        })
    }
}

/// Source of the channel's live status.
#[async_trait]
pub trait LiveProber: Send + Sync + 'static {
    /// Query the current status. Errors are transient probe failures.
    async fn probe(&self) -> Result<LiveStatus>;
}

/// [`LiveProber`] backed by the Chzzk live-detail API.
pub struct ChzzkProber {
    chzzk: Chzzk,
}

impl ChzzkProber {
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        let client = create_client_builder(Some(config.probe_timeout))
            .build()
            .map_err(ExtractorError::from)?;
        let chzzk = Chzzk::new(
            config.channel_id.clone(),
            client,
            Some(config.credentials.cookie_string()),
        )
        .with_api_base(config.api_base.clone());

        Ok(Self { chzzk })
    }

    pub fn live_url(&self) -> &str {
        self.chzzk.live_url()
    }
}

#[async_trait]
impl LiveProber for ChzzkProber {
    async fn probe(&self) -> Result<LiveStatus> {
        debug!(channel = %self.chzzk.channel_id(), "Checking live status");
        let info = self.chzzk.extract().await.inspect_err(|e| {
            if !e.is_transient() {
                warn!(
                    channel = %self.chzzk.channel_id(),
                    error = %e,
                    "Live status request was rejected; check CHANNEL_ID and cookies"
                );
            }
        })?;
        Ok(LiveStatus::from_media_info(
            self.chzzk.channel_id(),
            info,
            self.chzzk.live_url(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn config(api_base: &str) -> ChannelConfig {
        ChannelConfig::from_lookup(|key| {
            match key {
                "CHANNEL_ID" => Some("abc123"),
                "NID_AUT" => Some("aut"),
                "NID_SES" => Some("ses"),
                "CHZZK_API_BASE" => Some(api_base),
                "PROBE_TIMEOUT" => Some("2"),
                _ => None,
            }
            .map(str::to_string)
        })
        .unwrap()
    }

    #[test]
    fn test_offline_media_info() {
        let status = LiveStatus::from_media_info(
            "abc123",
            MediaInfo::offline("https://chzzk.naver.com"),
            "https://chzzk.naver.com/live/abc123",
        );
        assert!(status.is_offline());
    }

    #[test]
    fn test_live_media_info() {
        let info = MediaInfo::builder("https://chzzk.naver.com", "title", "Streamer")
            .category("Games")
            .is_live(true)
            .build();
        let status =
            LiveStatus::from_media_info("abc123", info, "https://chzzk.naver.com/live/abc123");

        let LiveStatus::Live(stream) = status else {
            panic!("expected live status");
        };
        assert_eq!(stream.channel_id, "abc123");
        assert_eq!(stream.channel_name, "Streamer");
        assert_eq!(stream.category.as_deref(), Some("Games"));
        assert_eq!(stream.stream_url, "https://chzzk.naver.com/live/abc123");
    }

    #[test]
    fn test_prober_uses_channel_live_url() {
        let prober = ChzzkProber::new(&config("http://127.0.0.1:9")).unwrap();
        assert_eq!(prober.live_url(), "https://chzzk.naver.com/live/abc123");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_probe_error() {
        // Port 9 (discard) is closed on test machines.
        let prober = ChzzkProber::new(&config("http://127.0.0.1:9")).unwrap();
        let err = prober.probe().await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }
}

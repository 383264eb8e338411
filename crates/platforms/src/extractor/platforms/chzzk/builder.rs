use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use reqwest::Client;
use tracing::debug;

use super::models::{LiveDetail, LiveDetailResponse};
use crate::extractor::error::ExtractorError;
use crate::extractor::platform_extractor::{Extractor, PlatformExtractor};
use crate::media::media_info::MediaInfo;

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_CHANNEL: &str = "UnknownChannel";

/// Chzzk (chzzk.naver.com) live-status extractor for a single channel.
pub struct Chzzk {
    extractor: Extractor,
    channel_id: String,
    api_base: String,
}

impl Chzzk {
    pub const BASE_URL: &str = "https://chzzk.naver.com";
    pub const API_BASE_URL: &str = "https://api.chzzk.naver.com";

    /// Korea Standard Time, the zone `openDate` is reported in.
    const KST_OFFSET_SECS: i32 = 9 * 3600;

    pub fn new(channel_id: impl Into<String>, client: Client, cookies: Option<String>) -> Self {
        let channel_id = channel_id.into();
        let mut extractor = Extractor::new(
            "Chzzk",
            format!("{}/live/{}", Self::BASE_URL, channel_id),
            client,
        );
        extractor.set_origin_and_referer_static(Self::BASE_URL);

        if let Some(cookies) = cookies {
            extractor.set_cookies_from_string(&cookies);
        }

        Self {
            extractor,
            channel_id,
            api_base: Self::API_BASE_URL.to_string(),
        }
    }

    /// Override the API host (e.g. a mirror or a local test server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Page URL of the live broadcast, resolvable by streamlink.
    pub fn live_url(&self) -> &str {
        &self.extractor.url
    }

    pub fn live_detail_url(&self) -> String {
        format!(
            "{}/service/v3/channels/{}/live-detail",
            self.api_base, self.channel_id
        )
    }

    async fn fetch_live_detail(&self) -> Result<String, ExtractorError> {
        let url = self.live_detail_url();
        let response = self.extractor.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractorError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.text().await?)
    }

    /// Turn a live-detail response body into [`MediaInfo`].
    pub fn parse_live_detail(&self, body: &str) -> Result<MediaInfo, ExtractorError> {
        let response: LiveDetailResponse = serde_json::from_str(body)?;

        if let Some(code) = response.code
            && code != 200
        {
            return Err(ExtractorError::ApiError {
                code,
                message: response.message.unwrap_or_default(),
            });
        }

        let Some(detail) = response.content else {
            debug!(channel = %self.channel_id, "No live detail content; channel has not streamed recently");
            return Ok(MediaInfo::offline(Self::BASE_URL));
        };

        Ok(self.media_info_from_detail(detail))
    }

    fn media_info_from_detail(&self, detail: LiveDetail) -> MediaInfo {
        let is_live = detail.is_open();
        let title = detail
            .live_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_TITLE)
            .to_string();
        let artist = detail
            .channel
            .as_ref()
            .and_then(|c| c.channel_name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_CHANNEL)
            .to_string();
        let live_start_time = detail.open_date.as_deref().and_then(parse_open_date);

        let mut builder = MediaInfo::builder(Self::BASE_URL, title, artist)
            .maybe_category(detail.live_category_value.filter(|c| !c.is_empty()))
            .live_start_time(live_start_time)
            .artist_url(format!("{}/{}", Self::BASE_URL, self.channel_id))
            .is_live(is_live);
        if is_live {
            builder = builder.stream_url(self.live_url());
        }
        builder.build()
    }
}

fn parse_open_date(value: &str) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(Chzzk::KST_OFFSET_SECS)?;
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()?
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl PlatformExtractor for Chzzk {
    fn get_extractor(&self) -> &Extractor {
        &self.extractor
    }

    async fn extract(&self) -> Result<MediaInfo, ExtractorError> {
        let body = self.fetch_live_detail().await?;
        self.parse_live_detail(&body)
    }
}

use serde::Deserialize;

/// Envelope returned by `service/v3/channels/{id}/live-detail`.
#[derive(Debug, Deserialize)]
pub struct LiveDetailResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    /// `null` when the channel has not broadcast for a long time.
    #[serde(default)]
    pub content: Option<LiveDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDetail {
    #[serde(default)]
    pub live_title: Option<String>,
    /// `OPEN` while broadcasting, `CLOSE` otherwise.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub live_category_value: Option<String>,
    /// Local (KST) time, e.g. `2024-05-01 21:00:00`.
    #[serde(default)]
    pub open_date: Option<String>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub channel: Option<ChannelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
}

impl LiveDetail {
    pub fn is_open(&self) -> bool {
        self.status.as_deref() == Some("OPEN")
    }
}

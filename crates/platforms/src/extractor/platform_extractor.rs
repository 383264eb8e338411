use crate::extractor::default::DEFAULT_UA;

use super::{super::media::media_info::MediaInfo, error::ExtractorError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Base extractor holding the HTTP client, platform headers and cookies.
///
/// Cookies are sent with every request built through [`Extractor::request`];
/// platforms that need an authenticated session (e.g. Chzzk's `NID_AUT` /
/// `NID_SES` pair) register them once at construction.
///
/// ```rust,no_run
/// # use reqwest::Client;
/// # use platforms_parser::extractor::platform_extractor::Extractor;
/// let mut extractor = Extractor::new("Platform", "https://example.com", Client::new());
/// extractor.set_cookies_from_string("token=xyz789; user_id=12345");
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    // url to extract from, e.g., "https://chzzk.naver.com/live/abc"
    pub url: String,
    // name of the platform, e.g., "Chzzk"
    pub platform_name: String,
    pub client: Client,
    platform_headers: HeaderMap,
    cookies: FxHashMap<String, String>,
}

impl Extractor {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        platform_name: S1,
        platform_url: S2,
        client: Client,
    ) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_UA),
        );
        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        Self {
            platform_name: platform_name.into(),
            url: platform_url.into(),
            client,
            platform_headers: default_headers,
            cookies: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn set_origin_and_referer_static(&mut self, base_url: &'static str) {
        let v = HeaderValue::from_static(base_url);
        self.platform_headers
            .insert(reqwest::header::ORIGIN, v.clone());
        self.platform_headers.insert(reqwest::header::REFERER, v);
    }

    pub fn add_cookie<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Set cookies from a cookie string (format: "name1=value1; name2=value2").
    ///
    /// Pairs with an empty name or value are ignored.
    pub fn set_cookies_from_string(&mut self, cookie_string: &str) {
        // Accept common separators: ';' from Cookie headers and '\n' from copy/paste.
        for part in cookie_string.split(&[';', '\n'][..]).map(str::trim) {
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }

            self.cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    /// Stored cookies rendered as a `Cookie` header value, sorted by name.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        let mut pairs: Vec<_> = self.cookies.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let header = pairs
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Create an HTTP request with platform headers and stored cookies applied.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.platform_headers.clone();

        if let Some(cookie_header) = self.cookie_header() {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => {
                    // Skip the Cookie header instead of sending an invalid value.
                    debug!(error = %e, "Failed to build Cookie header");
                }
            }
        }

        self.client.request(method, url).headers(headers)
    }
}

#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    fn get_extractor(&self) -> &Extractor;

    /// Fetch the current media information for the configured channel.
    async fn extract(&self) -> Result<MediaInfo, ExtractorError>;
}

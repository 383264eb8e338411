//! Process-wide configuration.
//!
//! Settings are read once at startup from environment-style key/value pairs
//! (an optional `.env` file layered under the process environment) and stay
//! immutable for the lifetime of the process. Parsing goes through a lookup
//! closure so it can be exercised without touching the real environment.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::domain::{BackoffPolicy, BackoffStrategy};
use crate::{Error, Result};

pub const DEFAULT_RECORD_DIR: &str = "./recordings";
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_PID_FILE: &str = "./chzzk-srec.pid";
pub const DEFAULT_API_BASE: &str = "https://api.chzzk.naver.com";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp4";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const DAY_SECS: u64 = 24 * 60 * 60;
const WEEK_SECS: u64 = 7 * DAY_SECS;
/// A century, comfortably inside chrono's date range.
const MAX_RETENTION_DAYS: u32 = 36_500;

/// Load an optional `.env` file into the process environment.
///
/// An explicitly given file must exist; the implicit `./.env` is optional.
/// Variables already present in the environment win over the file.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                Error::config(format!("failed to load env file {}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "Loaded env file");
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                debug!(path = %path.display(), "Loaded env file");
            }
        }
    }
    Ok(())
}

/// Authentication cookie pair for the channel metadata source and capture tool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    nid_aut: String,
    nid_ses: String,
}

impl Credentials {
    pub fn new(nid_aut: impl Into<String>, nid_ses: impl Into<String>) -> Self {
        Self {
            nid_aut: nid_aut.into(),
            nid_ses: nid_ses.into(),
        }
    }

    /// Cookie pairs in `name=value` form.
    pub fn cookie_pairs(&self) -> [(&'static str, &str); 2] {
        [("NID_AUT", self.nid_aut.as_str()), ("NID_SES", self.nid_ses.as_str())]
    }

    /// `Cookie` header value, e.g. `NID_AUT=..; NID_SES=..`.
    pub fn cookie_string(&self) -> String {
        self.cookie_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("nid_aut", &"<redacted>")
            .field("nid_ses", &"<redacted>")
            .finish()
    }
}

/// Filesystem locations shared by `run`, `stop` and `status`.
///
/// These do not require credentials so the lifecycle commands can work with a
/// partial environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub pid_file: PathBuf,
    /// Extension of recording files, without the dot.
    pub output_format: String,
}

impl RuntimePaths {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let output_format = env.string("OUTPUT_FORMAT", DEFAULT_OUTPUT_FORMAT);
        if !output_format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::config(format!(
                "OUTPUT_FORMAT must be a bare extension, got '{output_format}'"
            )));
        }

        Ok(Self {
            output_dir: PathBuf::from(env.string("RECORD_DIR", DEFAULT_RECORD_DIR)),
            log_dir: PathBuf::from(env.string("LOG_DIR", DEFAULT_LOG_DIR)),
            pid_file: PathBuf::from(env.string("PID_FILE", DEFAULT_PID_FILE)),
            output_format: output_format.to_lowercase(),
        })
    }
}

/// Capture tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamlinkConfig {
    pub binary_path: String,
    pub quality: String,
    /// Extra arguments inserted before the stream URL.
    pub extra_args: Vec<String>,
}

impl Default for StreamlinkConfig {
    fn default() -> Self {
        Self {
            binary_path: "streamlink".to_string(),
            quality: "best".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Retention settings. Zero disables the respective rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    pub retention_days: u32,
    pub max_disk_usage_percent: u8,
    /// Period of timer-driven retention passes.
    pub interval: Duration,
}

/// Complete configuration of one recorder instance.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub channel_id: String,
    pub credentials: Credentials,
    pub paths: RuntimePaths,
    pub poll_interval: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffPolicy,
    pub retention: RetentionConfig,
    pub shutdown_grace: Duration,
    pub streamlink: StreamlinkConfig,
    pub log_level: String,
    pub api_base: String,
    pub probe_timeout: Duration,
}

impl ChannelConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let channel_id = env.required("CHANNEL_ID")?;
        if !channel_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::config(format!(
                "CHANNEL_ID must be alphanumeric, got '{channel_id}'"
            )));
        }

        let credentials = Credentials::new(env.required("NID_AUT")?, env.required("NID_SES")?);
        let paths = RuntimePaths::from_lookup(&lookup)?;

        let check_interval = env.bounded("CHECK_INTERVAL", 60, 1..=DAY_SECS)?;
        let poll_interval = Duration::from_secs(check_interval);

        let retry_count: u32 = env.parse("RETRY_COUNT", 3)?;
        if retry_count < 1 {
            return Err(Error::config("RETRY_COUNT must be at least 1"));
        }
        let retry_delay = Duration::from_secs(env.bounded("RETRY_DELAY", 5, 0..=DAY_SECS)?);

        let strategy: BackoffStrategy = env.parse("BACKOFF_STRATEGY", BackoffStrategy::Exponential)?;
        let multiplier: f64 = env.parse("BACKOFF_MULTIPLIER", 2.0)?;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(format!(
                "BACKOFF_MULTIPLIER must be a finite number >= 1.0, got {multiplier}"
            )));
        }
        let backoff_max = env.bounded("BACKOFF_MAX", 1800, 1..=WEEK_SECS)?;
        if backoff_max < check_interval {
            return Err(Error::config(format!(
                "BACKOFF_MAX ({backoff_max}s) must not be lower than CHECK_INTERVAL ({check_interval}s)"
            )));
        }
        let jitter = env.flag("BACKOFF_JITTER", false)?;
        let backoff = BackoffPolicy::new(strategy, poll_interval, Duration::from_secs(backoff_max))
            .with_multiplier(multiplier)
            .with_jitter(jitter);

        let max_disk_usage_percent: u8 = env.parse("MAX_DISK_USAGE_PERCENT", 90)?;
        if max_disk_usage_percent > 100 {
            return Err(Error::config(format!(
                "MAX_DISK_USAGE_PERCENT must be between 0 and 100, got {max_disk_usage_percent}"
            )));
        }
        let retention_interval = env.bounded("RETENTION_INTERVAL", 3600, 1..=WEEK_SECS)?;
        let retention = RetentionConfig {
            retention_days: env.bounded("RETENTION_DAYS", 0, 0..=MAX_RETENTION_DAYS)?,
            max_disk_usage_percent,
            interval: Duration::from_secs(retention_interval),
        };

        let log_level = env.string("LOG_LEVEL", "info").to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(Error::config(format!(
                "LOG_LEVEL must be one of {}, got '{log_level}'",
                LOG_LEVELS.join("/")
            )));
        }

        let streamlink = StreamlinkConfig {
            binary_path: env.string("STREAMLINK_PATH", "streamlink"),
            quality: env.string("STREAM_QUALITY", "best"),
            extra_args: env
                .optional("STREAMLINK_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        };

        let api_base = env.string("CHZZK_API_BASE", DEFAULT_API_BASE);
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(Error::config(format!(
                "CHZZK_API_BASE must be an http(s) URL, got '{api_base}'"
            )));
        }

        let probe_timeout = env.bounded("PROBE_TIMEOUT", 10, 1..=300)?;
        let shutdown_grace = env.bounded("SHUTDOWN_GRACE", 10, 0..=3600)?;

        Ok(Self {
            channel_id,
            credentials,
            paths,
            poll_interval,
            retry_count,
            retry_delay,
            backoff,
            retention,
            shutdown_grace: Duration::from_secs(shutdown_grace),
            streamlink,
            log_level,
            api_base: api_base.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(probe_timeout),
        })
    }
}

/// Thin typed view over a lookup closure.
struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| Error::config(format!("{key} is required but not set")))
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::config(format!("invalid value for {key} '{raw}': {e}"))),
        }
    }

    /// Like [`Env::parse`], rejecting values outside `range`.
    fn bounded<T>(&self, key: &str, default: T, range: RangeInclusive<T>) -> Result<T>
    where
        T: FromStr + PartialOrd + fmt::Display,
        T::Err: fmt::Display,
    {
        let value = self.parse(key, default)?;
        if !range.contains(&value) {
            return Err(Error::config(format!(
                "{key} must be between {} and {}, got {value}",
                range.start(),
                range.end()
            )));
        }
        Ok(value)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(Error::config(format!(
                    "invalid value for {key} '{v}': expected true or false"
                ))),
            },
        }
    }
}

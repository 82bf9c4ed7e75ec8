//! Configuration types for discord-dl

use crate::error::{Error, Result};
use crate::naming::PathTemplate;
use crate::utils::extract_channel_ids;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default channel and DM path template
pub const DEFAULT_FORMAT: &str = "downloads/{date:%Y-%m-%d}_{id}_{filename}.{ext}";

/// Default Discord REST API base
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

/// Default origin attachments must be served from
pub const DEFAULT_ATTACHMENT_HOST: &str = "https://cdn.discordapp.com";

/// Main configuration for an archive run
///
/// Every field has a default so a config file only needs the token and channels.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Access credential sent as the `Authorization` header on API requests
    #[serde(default)]
    pub token: String,

    /// Download root the path templates are resolved against (default: ".")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Channel ids or channel URLs, processed in this order
    #[serde(default)]
    pub channels: Vec<String>,

    /// Stop after this many (filtered) messages per channel (None = whole history)
    #[serde(default)]
    pub message_count: Option<usize>,

    /// Delay between remote-affecting operations
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Retry behavior for page fetches and attachment downloads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Message date/author filters
    #[serde(default)]
    pub filter: FilterConfig,

    /// Path templates and filename sanitization
    #[serde(default)]
    pub naming: NamingConfig,

    /// Resume partial downloads from their current size (default: true)
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Go through every check but skip writing attachment bytes
    #[serde(default)]
    pub simulate: bool,

    /// REST API base URL (default: "https://discord.com/api/v9")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Origins attachments may be downloaded from; others are skipped with a warning
    #[serde(default = "default_attachment_hosts")]
    pub attachment_hosts: Vec<String>,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            download_dir: default_download_dir(),
            channels: Vec::new(),
            message_count: None,
            pacing: PacingConfig::default(),
            retry: RetryConfig::default(),
            filter: FilterConfig::default(),
            naming: NamingConfig::default(),
            resume: true,
            simulate: false,
            api_base: default_api_base(),
            attachment_hosts: default_attachment_hosts(),
            request_timeout: default_request_timeout(),
        }
    }
}

// Hand-written so the token never ends up in logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("download_dir", &self.download_dir)
            .field("channels", &self.channels)
            .field("message_count", &self.message_count)
            .field("pacing", &self.pacing)
            .field("retry", &self.retry)
            .field("filter", &self.filter)
            .field("naming", &self.naming)
            .field("resume", &self.resume)
            .field("simulate", &self.simulate)
            .field("api_base", &self.api_base)
            .field("attachment_hosts", &self.attachment_hosts)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Pre-flight validation, run before any network activity
    ///
    /// Rejects a missing token, absolute or unparsable templates, a direct-message template
    /// naming server-only variables, a nonexistent download root, an inverted or oversized
    /// pacing range, a zero attempt ceiling and an empty channel list.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::config("token", "No discord auth token passed"));
        }

        for (key, template) in [
            ("channel_format", &self.naming.channel_format),
            ("dm_format", &self.naming.dm_format),
        ] {
            if is_absolute_template(template) {
                return Err(Error::config(
                    key,
                    format!("{key} should not be an absolute filepath: {template}"),
                ));
            }
            let parsed = PathTemplate::parse(template)?;
            if key == "dm_format" && parsed.uses_server_variables() {
                return Err(Error::config(
                    key,
                    format!(
                        "{key} uses channel or server variables that direct messages never have: {template}"
                    ),
                ));
            }
        }

        if !self.download_dir.is_dir() {
            return Err(Error::config(
                "download_dir",
                format!(
                    "Download path does not exist: {}",
                    self.download_dir.display()
                ),
            ));
        }

        self.pacing.validate()?;

        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "max_attempts must be at least 1",
            ));
        }

        if self.channel_ids().is_empty() {
            return Err(Error::config("channels", "No valid channel ids given"));
        }

        Ok(())
    }

    /// Channel ids extracted from the configured ids/URLs, in order
    pub fn channel_ids(&self) -> Vec<String> {
        extract_channel_ids(&self.channels)
    }
}

fn is_absolute_template(template: &str) -> bool {
    let path = std::path::Path::new(template);
    path.is_absolute() || path.has_root()
}

/// Retry configuration shared by page fetches and attachment downloads
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff step; retry `n` waits `n × backoff_step` (default: 30 seconds)
    #[serde(default = "default_backoff_step", with = "duration_serde")]
    pub backoff_step: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step: default_backoff_step(),
        }
    }
}

/// Pacing delay: `base + uniform(random_min, random_max)` seconds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Fixed part of the delay in seconds
    #[serde(default)]
    pub base: f64,

    /// Lower bound of the random part in seconds
    #[serde(default)]
    pub random_min: f64,

    /// Upper bound of the random part in seconds
    #[serde(default)]
    pub random_max: f64,
}

impl PacingConfig {
    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("pacing.base", self.base),
            ("pacing.random_min", self.random_min),
            ("pacing.random_max", self.random_max),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(
                    key,
                    format!("{key} must be a non-negative number of seconds, got {value}"),
                ));
            }
        }
        if self.random_min > self.random_max {
            return Err(Error::config(
                "pacing.random_min",
                format!(
                    "sleep range is inverted: [{}, {}]",
                    self.random_min, self.random_max
                ),
            ));
        }
        if Duration::try_from_secs_f64(self.base + self.random_max).is_err() {
            return Err(Error::config(
                "pacing.base",
                format!(
                    "sleep of {} seconds is too long",
                    self.base + self.random_max
                ),
            ));
        }
        Ok(())
    }
}

/// Message filter criteria; all set criteria must match
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Only messages posted on this date
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Only messages posted before this date (exclusive)
    #[serde(default)]
    pub date_before: Option<NaiveDate>,

    /// Only messages posted after this date (exclusive)
    #[serde(default)]
    pub date_after: Option<NaiveDate>,

    /// Only messages from these usernames (empty = any)
    #[serde(default)]
    pub usernames: Vec<String>,

    /// Only messages from these user ids (empty = any)
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Path templates and sanitization switches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Template for attachments in server channels
    #[serde(default = "default_format")]
    pub channel_format: String,

    /// Template for attachments in direct-message channels
    #[serde(default = "default_format")]
    pub dm_format: String,

    /// Apply Windows naming rules even on other platforms
    #[serde(default)]
    pub windows_filenames: bool,

    /// Restrict names to printable ASCII
    #[serde(default)]
    pub restrict_filenames: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            channel_format: default_format(),
            dm_format: default_format(),
            windows_filenames: false,
            restrict_filenames: false,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_attachment_hosts() -> Vec<String> {
    vec![DEFAULT_ATTACHMENT_HOST.to_string()]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_step() -> Duration {
    Duration::from_secs(30)
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

/// Serialize `Duration` as (fractional) seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

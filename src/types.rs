//! Core types for discord-dl
//!
//! Wire types mirror the subset of the Discord REST payloads the archiver reads;
//! unknown fields are ignored. Everything fetched is treated as immutable.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A message in a channel's history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message snowflake id
    pub id: String,
    /// Post time, always offset-qualified (fractional seconds optional)
    pub timestamp: DateTime<FixedOffset>,
    /// Who posted it
    pub author: Author,
    /// Attachments in display order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Message author
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User snowflake id
    pub id: String,
    /// Unique username
    pub username: String,
    /// Display name, when the user has set one
    #[serde(default)]
    pub global_name: Option<String>,
}

/// A file attached to a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment snowflake id
    pub id: String,
    /// Direct download URL
    pub url: String,
    /// Original filename including extension
    pub filename: String,
    /// Size in bytes as reported by the API
    #[serde(default)]
    pub size: Option<u64>,
}

impl Attachment {
    /// Filename without its extension
    pub fn stem(&self) -> &str {
        self.split_filename().0
    }

    /// Extension without the leading dot (empty if none)
    pub fn extension(&self) -> &str {
        self.split_filename().1
    }

    // A leading dot (".bashrc") is part of the stem, not an extension
    fn split_filename(&self) -> (&str, &str) {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => (&self.filename[..idx], &self.filename[idx + 1..]),
            _ => (&self.filename, ""),
        }
    }
}

/// Channel metadata from `GET /channels/{id}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel snowflake id
    pub id: String,
    /// Owning server, absent for direct-message channels
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel name
    #[serde(default)]
    pub name: Option<String>,
    /// Channel topic
    #[serde(default)]
    pub topic: Option<String>,
}

/// Server metadata from `GET /guilds/{id}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Server snowflake id
    pub id: String,
    /// Server name
    pub name: String,
    /// Owner's user id
    pub owner_id: String,
}

/// The authenticated user from `GET /users/@me`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User snowflake id
    pub id: String,
    /// Username
    pub username: String,
}

/// Successful result of a single download attempt
///
/// Failures are reported as [`crate::error::DownloadError`] instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// The final file already holds the server's content; nothing was transferred
    AlreadyComplete {
        /// Which check confirmed it
        reason: String,
    },
    /// Bytes were transferred, verified and moved into place
    Downloaded {
        /// Transport status (200 or 206)
        status: u16,
        /// Reason phrase
        reason: String,
        /// Bytes written during this attempt
        bytes: u64,
    },
    /// Simulate mode: all checks passed, transfer skipped
    Simulated {
        /// Transport status
        status: u16,
        /// Reason phrase
        reason: String,
    },
}

/// Event emitted by the archiver
///
/// Subscribe with [`crate::Archiver::subscribe`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Started processing a channel
    ChannelStarted {
        /// Channel id
        channel_id: String,
    },

    /// A page of message history arrived
    PageFetched {
        /// Channel id
        channel_id: String,
        /// Messages in the page (unfiltered)
        count: usize,
        /// Messages kept so far after filtering
        kept: usize,
    },

    /// A channel could not be processed; remaining channels continue
    ChannelFailed {
        /// Channel id
        channel_id: String,
        /// Error message
        error: String,
    },

    /// An attachment was not downloaded
    AttachmentSkipped {
        /// Attachment URL
        url: String,
        /// Why it was skipped
        reason: String,
    },

    /// A transfer is starting
    DownloadStarted {
        /// Final destination
        path: PathBuf,
        /// Byte offset the transfer resumes from
        resume_from: u64,
        /// Expected total size, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Transfer progress
    DownloadProgress {
        /// Final destination
        path: PathBuf,
        /// Bytes on disk so far, including the resume offset
        downloaded: u64,
        /// Expected total size, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// An attachment ended successfully
    DownloadFinished {
        /// Final destination
        path: PathBuf,
        /// How it ended
        outcome: DownloadOutcome,
    },

    /// An attachment failed after retries (or terminally)
    DownloadFailed {
        /// Attachment URL
        url: String,
        /// Final destination
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Sleeping between remote-affecting operations
    Paced {
        /// Delay applied
        #[serde(with = "secs_f64")]
        delay: Duration,
    },

    /// The run is over
    RunFinished {
        /// Totals for the run
        summary: RunSummary,
    },
}

/// Totals for one archive run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Attachments transferred and verified
    pub downloaded: usize,
    /// Attachments whose final file already matched
    pub already_present: usize,
    /// Attachments that passed all checks in simulate mode
    pub simulated: usize,
    /// Attachments skipped before any transfer (foreign host, unresolved template)
    pub skipped: usize,
    /// Attachments that failed terminally or after retries
    pub failed: usize,
    /// Channels aborted because metadata or a page could not be fetched
    pub failed_channels: Vec<String>,
}

impl RunSummary {
    /// Record a successful outcome
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::AlreadyComplete { .. } => self.already_present += 1,
            DownloadOutcome::Downloaded { .. } => self.downloaded += 1,
            DownloadOutcome::Simulated { .. } => self.simulated += 1,
        }
    }
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Duration::try_from_secs_f64(f64::deserialize(d)?).map_err(D::Error::custom)
    }
}

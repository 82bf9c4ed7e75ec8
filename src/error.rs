//! Error types for discord-dl
//!
//! This module provides the error taxonomy used throughout the library:
//! - Configuration and template errors (fatal, reported before any network activity)
//! - Remote API errors (status codes from channel, guild and message endpoints)
//! - Download errors (transfer status, integrity mismatches, conflicting local files)
//!
//! Retry classification for these errors lives in [`crate::retry::IsRetryable`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for discord-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for discord-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Path template could not be parsed or expanded
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The access credential was rejected by the remote API
    #[error("401 Unauthorized: invalid token")]
    Unauthorized,

    /// The remote API answered with a non-success status
    #[error("API request to {url} failed: {status} {reason}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        reason: String,
        /// Request URL (without the credential)
        url: String,
    },

    /// Attachment download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Download(DownloadError::Status { status, .. }) => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors raised while parsing or expanding a path template
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` was never closed or a lone `}` appeared
    #[error("malformed template {template:?}: {reason}")]
    Malformed {
        /// The offending template segment
        template: String,
        /// What is wrong with it
        reason: String,
    },

    /// Placeholder names a variable outside the supported set
    #[error("unknown placeholder {{{name}}}")]
    UnknownVariable {
        /// The placeholder name as written
        name: String,
    },

    /// A format spec was given for a variable that does not support one
    #[error("placeholder {{{name}}} does not accept a format spec (got {spec:?})")]
    UnsupportedFormat {
        /// Variable name
        name: String,
        /// The rejected spec
        spec: String,
    },

    /// The strftime spec for `date` is invalid
    #[error("invalid date format {spec:?}")]
    InvalidDateFormat {
        /// The rejected spec
        spec: String,
    },

    /// Placeholder refers to a variable this channel does not carry
    /// (e.g. `{server_name}` in a direct-message channel)
    #[error("placeholder {{{name}}} has no value for this channel")]
    Unresolved {
        /// Variable name
        name: String,
    },
}

/// Attachment download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Server answered with a status other than 200/206
    #[error("{status} {reason}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Reason phrase
        reason: String,
    },

    /// A final file already exists but its content does not match the server's
    #[error("{} exists with mismatched content", path.display())]
    ExistingMismatch {
        /// The existing final file
        path: PathBuf,
    },

    /// Downloaded content does not hash to the server-reported entity tag
    #[error("file completed with incorrect hash | expected: {expected} got: {actual}")]
    HashMismatch {
        /// Entity tag reported by the server
        expected: String,
        /// Hash of the local file
        actual: String,
    },

    /// Downloaded size does not match the expected total
    #[error("file completed with incorrect file size | total: {expected} downloaded: {actual}")]
    SizeMismatch {
        /// Resume offset plus announced content length
        expected: u64,
        /// Bytes present in the partial file
        actual: u64,
    },
}

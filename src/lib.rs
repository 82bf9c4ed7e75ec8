//! # discord-dl
//!
//! Archive the file attachments posted in Discord channels to a local directory tree.
//!
//! ## Design Philosophy
//!
//! discord-dl is designed to be:
//! - **Resumable** - Interrupted transfers continue from their partial file
//! - **Verified** - Files are only moved into place after hash and size checks
//! - **Polite** - Configurable pacing between requests and linear retry backoff
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use discord_dl::{Archiver, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         token: "your-token".to_string(),
//!         channels: vec!["https://discord.com/channels/@me/123456789".to_string()],
//!         ..Default::default()
//!     };
//!
//!     let archiver = Archiver::new(config)?;
//!     archiver.verify_credentials().await?;
//!
//!     // Subscribe to events
//!     let mut events = archiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = archiver.run().await?;
//!     println!("{summary:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive run orchestration
pub mod archiver;
/// Remote API access
pub mod client;
/// Configuration types
pub mod config;
/// Resumable attachment downloads
pub mod download;
/// Error types
pub mod error;
/// Message history pagination
pub mod fetcher;
/// Message filtering by date and author
pub mod filter;
/// Path templates and filename sanitization
pub mod naming;
/// Delays between remote requests
pub mod pacing;
/// Retry logic with linear backoff
pub mod retry;
/// Wire types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use archiver::Archiver;
pub use client::{ChannelApi, HttpChannelApi};
pub use config::{Config, FilterConfig, NamingConfig, PacingConfig, RetryConfig};
pub use download::DownloadEngine;
pub use error::{DownloadError, Error, Result, TemplateError};
pub use fetcher::MessageFetcher;
pub use filter::MessageFilter;
pub use naming::{ChannelVariables, FormatVariables, PathBuilder, PathTemplate};
pub use pacing::Pacer;
pub use retry::{IsRetryable, with_retry};
pub use types::{Attachment, Author, Channel, DownloadOutcome, Event, Guild, Message, RunSummary, User};

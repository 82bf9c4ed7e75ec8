//! Archive run orchestration split into focused submodules.
//!
//! The `Archiver` struct and its methods are organized by concern:
//! - [`metadata`] - Credential probe and channel/server metadata resolution
//! - [`run`] - Channel loop, attachment selection and pacing

mod metadata;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::client::{ChannelApi, HttpChannelApi};
use crate::config::Config;
use crate::download::DownloadEngine;
use crate::error::{Error, Result};
use crate::filter::MessageFilter;
use crate::naming::PathBuilder;
use crate::pacing::Pacer;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::{Origin, Url};

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 1000;

/// Downloads every attachment of the configured channels
///
/// Work is strictly sequential: one channel, one request and one file at a time.
pub struct Archiver {
    pub(crate) config: Arc<Config>,
    pub(crate) api: Arc<dyn ChannelApi>,
    pub(crate) engine: DownloadEngine,
    pub(crate) paths: PathBuilder,
    pub(crate) filter: MessageFilter,
    pub(crate) pacer: Pacer,
    /// Origins attachment URLs must belong to
    pub(crate) allowed_origins: Vec<Origin>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Archiver {
    /// Create an archiver talking to the configured REST API
    ///
    /// Validates the configuration first; nothing touches the network here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(HttpChannelApi::new(&config)?);
        Self::with_api(config, api)
    }

    /// Create an archiver over a custom [`ChannelApi`] implementation
    pub fn with_api(config: Config, api: Arc<dyn ChannelApi>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        let engine = DownloadEngine::new(&config, event_tx.clone())?;
        let paths = PathBuilder::new(&config.naming)?;

        let allowed_origins = config
            .attachment_hosts
            .iter()
            .map(|host| {
                Url::parse(host).map(|url| url.origin()).map_err(|e| {
                    Error::config("attachment_hosts", format!("invalid host {host:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            filter: MessageFilter::new(config.filter.clone()),
            pacer: Pacer::new(&config.pacing),
            config: Arc::new(config),
            api,
            engine,
            paths,
            allowed_origins,
            event_tx,
        })
    }

    /// Subscribe to archive events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use discord_dl::{Archiver, Config, Event};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = Config {
    ///         token: "token".to_string(),
    ///         channels: vec!["123".to_string()],
    ///         ..Config::default()
    ///     };
    ///     let archiver = Archiver::new(config)?;
    ///
    ///     let mut events = archiver.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let Event::DownloadFinished { path, .. } = event {
    ///                 println!("saved {}", path.display());
    ///             }
    ///         }
    ///     });
    ///
    ///     let summary = archiver.run().await?;
    ///     println!("{} downloaded", summary.downloaded);
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration this archiver was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

//! Channel history pagination
//!
//! [`MessageFetcher`] walks a channel's history backward in pages of
//! [`PAGE_SIZE`], filtering each page as it arrives and stopping at the
//! message-count cutoff or at the first short page.

use crate::client::{ChannelApi, PAGE_SIZE};
use crate::config::RetryConfig;
use crate::error::Result;
use crate::filter::MessageFilter;
use crate::pacing::Pacer;
use crate::retry::with_retry;
use crate::types::{Event, Message};
use tokio::sync::broadcast;

/// Fetches and filters one channel's history
///
/// Borrowed collaborators only; the pagination cursor lives inside
/// [`fetch_all`](Self::fetch_all) for the duration of one channel.
pub struct MessageFetcher<'a> {
    api: &'a dyn ChannelApi,
    filter: &'a MessageFilter,
    retry: &'a RetryConfig,
    pacer: &'a Pacer,
    events: &'a broadcast::Sender<Event>,
}

impl<'a> MessageFetcher<'a> {
    /// Create a fetcher over the given collaborators
    pub fn new(
        api: &'a dyn ChannelApi,
        filter: &'a MessageFilter,
        retry: &'a RetryConfig,
        pacer: &'a Pacer,
        events: &'a broadcast::Sender<Event>,
    ) -> Self {
        Self {
            api,
            filter,
            retry,
            pacer,
            events,
        }
    }

    /// Fetch the filtered history of `channel_id`, newest first
    ///
    /// With `max_count`, stops as soon as that many messages have passed the filter
    /// and returns exactly that many. Each page request goes through the retry
    /// policy; an error here means the page could not be fetched within it.
    pub async fn fetch_all(&self, channel_id: &str, max_count: Option<usize>) -> Result<Vec<Message>> {
        if max_count == Some(0) {
            return Ok(Vec::new());
        }

        let mut kept: Vec<Message> = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let page = with_retry(self.retry, || {
                self.api.messages(channel_id, before.as_deref(), PAGE_SIZE)
            })
            .await?;

            let page_len = page.len();
            before = page.last().map(|m| m.id.clone());
            kept.extend(self.filter.apply(page));

            self.events
                .send(Event::PageFetched {
                    channel_id: channel_id.to_string(),
                    count: page_len,
                    kept: kept.len(),
                })
                .ok();

            if let Some(max) = max_count
                && kept.len() >= max
            {
                kept.truncate(max);
                tracing::debug!("Got {} messages for channel id {}", kept.len(), channel_id);
                return Ok(kept);
            }

            if page_len < PAGE_SIZE {
                tracing::debug!("Got {} messages for channel id {}", kept.len(), channel_id);
                return Ok(kept);
            }

            if let Some(delay) = self.pacer.pause().await {
                self.events.send(Event::Paced { delay }).ok();
            }
        }
    }
}

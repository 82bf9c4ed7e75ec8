//! Shared test helpers: an in-memory channel history behind [`ChannelApi`].

use crate::client::ChannelApi;
use crate::error::{Error, Result};
use crate::types::{Attachment, Author, Channel, Guild, Message, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Build a message with the given id, posted `id` minutes after a fixed epoch
pub(crate) fn message(id: u64, username: &str, attachments: Vec<Attachment>) -> Message {
    let epoch = DateTime::parse_from_rfc3339("2024-03-01T00:00:00+00:00").unwrap();
    Message {
        id: id.to_string(),
        timestamp: epoch + ChronoDuration::minutes(id as i64),
        author: Author {
            id: format!("u-{username}"),
            username: username.to_string(),
            global_name: None,
        },
        attachments,
    }
}

/// Attachment served from `base` (e.g. a wiremock server URI)
pub(crate) fn attachment(base: &str, id: &str, filename: &str) -> Attachment {
    Attachment {
        id: id.to_string(),
        url: format!("{base}/attachments/{id}/{filename}"),
        filename: filename.to_string(),
        size: None,
    }
}

/// History of `count` messages with ids `count..=1` (newest first)
pub(crate) fn history(count: u64) -> Vec<Message> {
    (1..=count).rev().map(|id| message(id, "alice", vec![])).collect()
}

/// In-memory [`ChannelApi`] serving per-channel histories newest-first
#[derive(Default)]
pub(crate) struct HistoryApi {
    pub(crate) histories: HashMap<String, Vec<Message>>,
    pub(crate) channels: HashMap<String, Channel>,
    pub(crate) guilds: HashMap<String, Guild>,
    /// Number of page requests that fail with a 500 before serving succeeds
    pub(crate) failures_before_success: AtomicUsize,
    /// Channels whose page requests always fail with this status
    pub(crate) broken_channels: HashMap<String, u16>,
    pub(crate) page_requests: AtomicUsize,
    pub(crate) cursors: Mutex<Vec<Option<String>>>,
}

impl HistoryApi {
    pub(crate) fn with_history(channel_id: &str, messages: Vec<Message>) -> Self {
        let mut api = Self::default();
        api.add_dm_channel(channel_id, messages);
        api
    }

    pub(crate) fn add_dm_channel(&mut self, channel_id: &str, messages: Vec<Message>) {
        self.channels.insert(
            channel_id.to_string(),
            Channel {
                id: channel_id.to_string(),
                guild_id: None,
                name: None,
                topic: None,
            },
        );
        self.histories.insert(channel_id.to_string(), messages);
    }

    pub(crate) fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelApi for HistoryApi {
    async fn current_user(&self) -> Result<User> {
        Ok(User {
            id: "0".into(),
            username: "me".into(),
        })
    }

    async fn channel(&self, channel_id: &str) -> Result<Channel> {
        self.channels.get(channel_id).cloned().ok_or(Error::Api {
            status: 404,
            reason: "Not Found".into(),
            url: format!("/channels/{channel_id}"),
        })
    }

    async fn guild(&self, guild_id: &str) -> Result<Guild> {
        self.guilds.get(guild_id).cloned().ok_or(Error::Api {
            status: 404,
            reason: "Not Found".into(),
            url: format!("/guilds/{guild_id}"),
        })
    }

    async fn messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        self.cursors
            .lock()
            .unwrap()
            .push(before.map(str::to_string));

        if let Some(status) = self.broken_channels.get(channel_id) {
            return Err(Error::Api {
                status: *status,
                reason: "broken".into(),
                url: format!("/channels/{channel_id}/messages"),
            });
        }
        if self
            .failures_before_success
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Api {
                status: 500,
                reason: "Internal Server Error".into(),
                url: format!("/channels/{channel_id}/messages"),
            });
        }

        let history = self.histories.get(channel_id).cloned().unwrap_or_default();
        let start = match before {
            Some(cursor) => history
                .iter()
                .position(|m| m.id == cursor)
                .map_or(history.len(), |idx| idx + 1),
            None => 0,
        };
        Ok(history.into_iter().skip(start).take(limit).collect())
    }
}

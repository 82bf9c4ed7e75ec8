//! Message filtering by date and author
//!
//! Filtering happens at message granularity: a message that fails any configured
//! criterion is dropped with all of its attachments. Unset criteria always pass.

use crate::config::FilterConfig;
use crate::types::Message;
use chrono::NaiveDate;

/// Predicate over message metadata built from [`FilterConfig`]
#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    criteria: FilterConfig,
}

impl MessageFilter {
    /// Create a filter from configured criteria
    #[must_use]
    pub fn new(criteria: FilterConfig) -> Self {
        Self { criteria }
    }

    /// Whether `message` passes every configured criterion
    ///
    /// The message timestamp is reduced to its calendar date in its own offset
    /// (time of day and offset discarded) before date comparisons.
    pub fn matches(&self, message: &Message) -> bool {
        let date = message_date(message);
        let c = &self.criteria;

        if let Some(exact) = c.date
            && date != exact
        {
            tracing::debug!(
                message_id = %message.id,
                "Message date {} != date {}",
                date,
                exact
            );
            return false;
        }
        if let Some(before) = c.date_before
            && date >= before
        {
            tracing::debug!(
                message_id = %message.id,
                "Message date {} >= date_before {}",
                date,
                before
            );
            return false;
        }
        if let Some(after) = c.date_after
            && date <= after
        {
            tracing::debug!(
                message_id = %message.id,
                "Message date {} <= date_after {}",
                date,
                after
            );
            return false;
        }
        if !c.usernames.is_empty() && !c.usernames.contains(&message.author.username) {
            tracing::debug!(
                message_id = %message.id,
                username = %message.author.username,
                "Message username not in allow-list"
            );
            return false;
        }
        if !c.user_ids.is_empty() && !c.user_ids.contains(&message.author.id) {
            tracing::debug!(
                message_id = %message.id,
                user_id = %message.author.id,
                "Message user id not in allow-list"
            );
            return false;
        }
        true
    }

    /// Keep the matching messages of `messages`, preserving order
    pub fn apply(&self, messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
        messages.into_iter().filter(|m| self.matches(m)).collect()
    }
}

/// Calendar date of a message in the offset it was reported with
#[must_use]
pub fn message_date(message: &Message) -> NaiveDate {
    message.timestamp.date_naive()
}

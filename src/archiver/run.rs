//! The archive run: channels in order, messages newest first, attachments as listed.

use crate::error::{Error, Result};
use crate::fetcher::MessageFetcher;
use crate::naming::{ChannelVariables, FormatVariables};
use crate::retry::with_retry;
use crate::types::{Attachment, Event, Message, RunSummary};
use url::Url;

use super::Archiver;

impl Archiver {
    /// Archive every configured channel
    ///
    /// A channel whose metadata or message history cannot be fetched is recorded in
    /// [`RunSummary::failed_channels`] and the run moves on. Individual attachment
    /// failures are counted and logged.
    ///
    /// # Errors
    ///
    /// Only a rejected credential ([`Error::Unauthorized`]) ends the run early.
    pub async fn run(&self) -> Result<RunSummary> {
        let channel_ids = self.config.channel_ids();
        let mut summary = RunSummary::default();

        for (index, channel_id) in channel_ids.iter().enumerate() {
            let last_channel = index + 1 == channel_ids.len();
            self.emit(Event::ChannelStarted {
                channel_id: channel_id.clone(),
            });

            match self.archive_channel(channel_id, last_channel, &mut summary).await {
                Ok(()) => {}
                Err(Error::Unauthorized) => return Err(Error::Unauthorized),
                Err(e) => {
                    tracing::error!(channel_id = %channel_id, error = %e, "Skipping channel");
                    summary.failed_channels.push(channel_id.clone());
                    self.emit(Event::ChannelFailed {
                        channel_id: channel_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            skipped = summary.skipped,
            failed = summary.failed,
            "Archive run finished"
        );
        self.emit(Event::RunFinished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn archive_channel(
        &self,
        channel_id: &str,
        last_channel: bool,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let channel = self.resolve_channel(channel_id).await?;

        let fetcher = MessageFetcher::new(
            self.api.as_ref(),
            &self.filter,
            &self.config.retry,
            &self.pacer,
            &self.event_tx,
        );
        let messages = fetcher
            .fetch_all(channel_id, self.config.message_count)
            .await?;
        tracing::info!(
            channel_id = %channel_id,
            messages = messages.len(),
            "Downloading attachments"
        );

        for (m_index, message) in messages.iter().enumerate() {
            let last_message = last_channel && m_index + 1 == messages.len();
            for (a_index, attachment) in message.attachments.iter().enumerate() {
                let requested = self
                    .archive_attachment(message, attachment, &channel, summary)
                    .await;
                let last = last_message && a_index + 1 == message.attachments.len();

                if requested
                    && !last
                    && let Some(delay) = self.pacer.pause().await
                {
                    self.emit(Event::Paced { delay });
                }
            }
        }
        Ok(())
    }

    /// Download one attachment; returns whether a request was made
    async fn archive_attachment(
        &self,
        message: &Message,
        attachment: &Attachment,
        channel: &ChannelVariables,
        summary: &mut RunSummary,
    ) -> bool {
        if !self.is_allowed_host(&attachment.url) {
            tracing::warn!("Unknown attachment URL: {}", attachment.url);
            self.skip(attachment, "not hosted on an allowed origin".to_string(), summary);
            return false;
        }

        let vars = FormatVariables::new(message, attachment, channel);
        let dest = match self.paths.build(&vars, &self.config.download_dir) {
            Ok(dest) => dest,
            Err(e) => {
                tracing::warn!(url = %attachment.url, error = %e, "Could not build download path");
                self.skip(attachment, e.to_string(), summary);
                return false;
            }
        };

        tracing::info!("Downloading {} to {}", attachment.url, dest.display());
        match with_retry(&self.config.retry, || {
            self.engine.download(&attachment.url, &dest)
        })
        .await
        {
            Ok(outcome) => {
                summary.record(&outcome);
                self.emit(Event::DownloadFinished { path: dest, outcome });
            }
            Err(e) => {
                tracing::error!(url = %attachment.url, error = %e, "Download failed");
                summary.failed += 1;
                self.emit(Event::DownloadFailed {
                    url: attachment.url.clone(),
                    path: dest,
                    error: e.to_string(),
                });
            }
        }
        true
    }

    fn skip(&self, attachment: &Attachment, reason: String, summary: &mut RunSummary) {
        summary.skipped += 1;
        self.emit(Event::AttachmentSkipped {
            url: attachment.url.clone(),
            reason,
        });
    }

    /// True when `url` belongs to one of the configured attachment origins
    pub(crate) fn is_allowed_host(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|url| self.allowed_origins.contains(&url.origin()))
            .unwrap_or(false)
    }
}

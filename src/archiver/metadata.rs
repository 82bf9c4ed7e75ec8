//! Credential probe and channel metadata resolution.

use crate::error::Result;
use crate::naming::ChannelVariables;
use crate::retry::with_retry;
use crate::types::User;

use super::Archiver;

impl Archiver {
    /// Check the access credential against `GET /users/@me`
    ///
    /// # Errors
    ///
    /// [`crate::Error::Unauthorized`] when the token is rejected; other API and network
    /// errors are passed through unchanged.
    pub async fn verify_credentials(&self) -> Result<User> {
        let user = self.api.current_user().await?;
        tracing::info!(user_id = %user.id, "Authenticated as {}", user.username);
        Ok(user)
    }

    /// Resolve the channel-level template variables for `channel_id`
    ///
    /// Server channels also fetch their server. Both requests go through the retry
    /// policy; failure here aborts the channel.
    pub(crate) async fn resolve_channel(&self, channel_id: &str) -> Result<ChannelVariables> {
        let retry = &self.config.retry;
        let channel = with_retry(retry, || self.api.channel(channel_id)).await?;

        let guild = match channel.guild_id.as_deref() {
            Some(guild_id) => Some(with_retry(retry, || self.api.guild(guild_id)).await?),
            None => None,
        };

        let vars = ChannelVariables::from_metadata(&channel, guild.as_ref());
        match &vars.server {
            Some(server) => tracing::debug!(
                channel_id = %channel_id,
                server_id = %server.server_id,
                "Resolved server channel {}",
                vars.channel_name.as_deref().unwrap_or_default()
            ),
            None => tracing::debug!(channel_id = %channel_id, "Resolved direct-message channel"),
        }
        Ok(vars)
    }
}

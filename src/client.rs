//! Request capability for the remote chat API
//!
//! [`ChannelApi`] is the seam between the archiver and the transport: the
//! production implementation, [`HttpChannelApi`], talks to the Discord REST API
//! with `reqwest`; tests substitute in-memory histories.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Channel, Guild, Message, User};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

/// Messages per history page; a shorter page is the last one
pub const PAGE_SIZE: usize = 50;

/// Read-only view of the remote API used by the archiver
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// The authenticated user (`GET /users/@me`)
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] when the credential is rejected.
    async fn current_user(&self) -> Result<User>;

    /// Channel metadata (`GET /channels/{id}`)
    async fn channel(&self, channel_id: &str) -> Result<Channel>;

    /// Server metadata (`GET /guilds/{id}`)
    async fn guild(&self, guild_id: &str) -> Result<Guild>;

    /// One page of history, newest first, strictly older than `before` when given
    /// (`GET /channels/{id}/messages?limit={limit}&before={before}`)
    async fn messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>>;
}

/// [`ChannelApi`] over HTTP with the credential sent on every request
#[derive(Clone)]
pub struct HttpChannelApi {
    client: reqwest::Client,
    base: String,
}

impl HttpChannelApi {
    /// Build a client for `config.api_base` authenticated with `config.token`
    pub fn new(config: &Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(config.token.trim())
            .map_err(|_| Error::config("token", "token contains invalid header characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("discord-dl/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ChannelApi for HttpChannelApi {
    async fn current_user(&self) -> Result<User> {
        self.get_json("/users/@me", &[]).await
    }

    async fn channel(&self, channel_id: &str) -> Result<Channel> {
        tracing::info!("Getting channel info for channel id {}", channel_id);
        self.get_json(&format!("/channels/{channel_id}"), &[]).await
    }

    async fn guild(&self, guild_id: &str) -> Result<Guild> {
        tracing::info!("Getting server info for server id {}", guild_id);
        self.get_json(&format!("/guilds/{guild_id}"), &[]).await
    }

    async fn messages(
        &self,
        channel_id: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut query = vec![("limit", limit.to_string())];
        match before {
            Some(before) => {
                tracing::info!(
                    "Getting messages before message id {} for channel id {}",
                    before,
                    channel_id
                );
                query.push(("before", before.to_string()));
            }
            None => tracing::info!("Getting messages for channel id {}", channel_id),
        }
        self.get_json(&format!("/channels/{channel_id}/messages"), &query)
            .await
    }
}

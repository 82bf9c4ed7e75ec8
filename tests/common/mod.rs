//! Common test utilities for discord-dl integration tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use discord_dl::config::RetryConfig;
use discord_dl::Config;
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Token the mock API accepts
pub const TOKEN: &str = "test-token";

/// Matches requests that do not carry the credential
pub struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

/// One mock server playing both the REST API (under `/api/v9`) and the CDN,
/// plus a temporary download root
pub struct MockDiscord {
    pub server: MockServer,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl MockDiscord {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Base URL attachments are served from
    pub fn cdn(&self) -> String {
        self.server.uri()
    }

    /// Valid configuration pointing at this mock
    pub fn config(&self, channels: &[&str]) -> Config {
        Config {
            token: TOKEN.to_string(),
            download_dir: self.dir.path().to_path_buf(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            api_base: format!("{}/api/v9", self.server.uri()),
            attachment_hosts: vec![self.server.uri()],
            retry: RetryConfig {
                max_attempts: 3,
                backoff_step: Duration::from_millis(10),
            },
            ..Config::default()
        }
    }

    pub async fn mount_user(&self) {
        Mock::given(method("GET"))
            .and(path("/api/v9/users/@me"))
            .and(header("Authorization", TOKEN))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "1", "username": "archivist"})),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_channel(&self, channel: Value) {
        let id = channel["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v9/channels/{id}")))
            .and(header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(channel))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_guild(&self, guild: Value) {
        let id = guild["id"].as_str().unwrap_or_default().to_string();
        Mock::given(method("GET"))
            .and(path(format!("/api/v9/guilds/{id}")))
            .and(header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(guild))
            .mount(&self.server)
            .await;
    }

    /// Serve `messages` (newest first) in pages of 50 keyed by the `before` cursor
    pub async fn mount_history(&self, channel_id: &str, messages: Vec<Value>) {
        let messages_path = format!("/api/v9/channels/{channel_id}/messages");
        let mut before: Option<String> = None;
        let mut pages = messages.chunks(50).map(<[Value]>::to_vec).collect::<Vec<_>>();
        if messages.len() % 50 == 0 {
            pages.push(Vec::new());
        }

        for page in pages {
            let next = page
                .last()
                .and_then(|m| m["id"].as_str())
                .map(str::to_string);
            let mock = Mock::given(method("GET"))
                .and(path(messages_path.as_str()))
                .and(query_param("limit", "50"))
                .and(header("Authorization", TOKEN));
            let mock = match &before {
                Some(cursor) => mock.and(query_param("before", cursor.as_str())),
                None => mock.and(query_param_is_missing("before")),
            };
            mock.respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(page)))
                .mount(&self.server)
                .await;
            before = next;
        }
    }

    /// Serve [`ATTACHMENT_BODY`] for every attachment path, refusing credentialed requests
    pub async fn mount_cdn(&self) {
        Mock::given(method("GET"))
            .and(path_regex("^/attachments/"))
            .and(NoAuthorization)
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(ATTACHMENT_BODY)
                    .insert_header("ETag", etag_of(ATTACHMENT_BODY).as_str()),
            )
            .mount(&self.server)
            .await;
    }

    /// Requests received whose path starts with `prefix`
    pub async fn requests_to(&self, prefix: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().starts_with(prefix))
            .collect()
    }
}

use super::*;
use crate::config::{PacingConfig, RetryConfig};
use crate::test_helpers::{HistoryApi, attachment, message};
use crate::types::{Channel, DownloadOutcome, Guild, RunSummary};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &[u8] = b"attachment bytes";

async fn cdn() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/attachments/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(BODY)
                .insert_header("ETag", format!("\"{:x}\"", md5::compute(BODY)).as_str()),
        )
        .mount(&server)
        .await;
    server
}

fn config(dir: &TempDir, cdn: &MockServer, channels: &[&str]) -> Config {
    Config {
        token: "token".to_string(),
        download_dir: dir.path().to_path_buf(),
        channels: channels.iter().map(|c| c.to_string()).collect(),
        attachment_hosts: vec![cdn.uri()],
        retry: RetryConfig {
            max_attempts: 2,
            backoff_step: Duration::from_millis(5),
        },
        ..Config::default()
    }
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn downloads_attachments_and_skips_foreign_hosts() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let api = HistoryApi::with_history(
        "10",
        vec![
            message(3, "alice", vec![attachment(&uri, "31", "a.png")]),
            message(
                2,
                "alice",
                vec![
                    attachment(&uri, "21", "b.txt"),
                    attachment("https://evil.example.com", "22", "c.exe"),
                ],
            ),
            message(1, "bob", vec![]),
        ],
    );
    let archiver = Archiver::with_api(config(&dir, &cdn, &["10"]), Arc::new(api)).unwrap();
    let mut rx = archiver.subscribe();

    let summary = archiver.run().await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            downloaded: 2,
            skipped: 1,
            ..RunSummary::default()
        }
    );
    let downloads = dir.path().join("downloads");
    assert_eq!(std::fs::read(downloads.join("2024-03-01_31_a.png")).unwrap(), BODY);
    assert_eq!(std::fs::read(downloads.join("2024-03-01_21_b.txt")).unwrap(), BODY);
    assert_eq!(std::fs::read_dir(&downloads).unwrap().count(), 2);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AttachmentSkipped { url, .. } if url.starts_with("https://evil.example.com")
    )));
    assert!(matches!(events.last(), Some(Event::RunFinished { .. })));
}

#[tokio::test]
async fn second_run_finds_everything_present() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let api = Arc::new(HistoryApi::with_history(
        "10",
        vec![message(1, "alice", vec![attachment(&uri, "11", "a.png")])],
    ));
    let archiver = Archiver::with_api(config(&dir, &cdn, &["10"]), api).unwrap();

    archiver.run().await.unwrap();
    let summary = archiver.run().await.unwrap();

    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.already_present, 1);
}

#[tokio::test]
async fn failed_channel_does_not_stop_the_run() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let mut api = HistoryApi::with_history("10", vec![]);
    api.broken_channels.insert("10".to_string(), 500);
    api.add_dm_channel(
        "20",
        vec![message(1, "alice", vec![attachment(&uri, "11", "a.png")])],
    );
    let archiver =
        Archiver::with_api(config(&dir, &cdn, &["10", "20"]), Arc::new(api)).unwrap();
    let mut rx = archiver.subscribe();

    let summary = archiver.run().await.unwrap();

    assert_eq!(summary.failed_channels, vec!["10".to_string()]);
    assert_eq!(summary.downloaded, 1);
    assert!(
        drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::ChannelFailed { channel_id, .. } if channel_id == "10"))
    );
}

#[tokio::test]
async fn server_channels_use_channel_format() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let mut api = HistoryApi::default();
    api.channels.insert(
        "10".to_string(),
        Channel {
            id: "10".to_string(),
            guild_id: Some("7".to_string()),
            name: Some("general".to_string()),
            topic: None,
        },
    );
    api.guilds.insert(
        "7".to_string(),
        Guild {
            id: "7".to_string(),
            name: "My Server".to_string(),
            owner_id: "70".to_string(),
        },
    );
    api.histories.insert(
        "10".to_string(),
        vec![message(1, "alice", vec![attachment(&uri, "11", "a.png")])],
    );
    let mut config = config(&dir, &cdn, &["10"]);
    config.naming.channel_format = "{server_name}/{channel_name}/{username}_{filename}.{ext}".into();
    let archiver = Archiver::with_api(config, Arc::new(api)).unwrap();

    archiver.run().await.unwrap();

    assert!(dir.path().join("My Server/general/alice_a.png").is_file());
}

#[tokio::test]
async fn dm_format_with_server_variables_is_rejected() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let api = HistoryApi::with_history(
        "10",
        vec![message(1, "alice", vec![attachment(&uri, "11", "a.png")])],
    );
    let mut config = config(&dir, &cdn, &["10"]);
    config.naming.dm_format = "{server_name}/{filename}.{ext}".into();

    match Archiver::with_api(config, Arc::new(api)) {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("dm_format")),
        Err(other) => panic!("expected dm_format error, got {other:?}"),
        Ok(_) => panic!("expected dm_format error"),
    }
    assert_eq!(cdn.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn simulate_counts_without_writing() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let api = HistoryApi::with_history(
        "10",
        vec![message(1, "alice", vec![attachment(&uri, "11", "a.png")])],
    );
    let mut config = config(&dir, &cdn, &["10"]);
    config.simulate = true;
    let archiver = Archiver::with_api(config, Arc::new(api)).unwrap();
    let mut rx = archiver.subscribe();

    let summary = archiver.run().await.unwrap();

    assert_eq!(summary.simulated, 1);
    assert!(!dir.path().join("downloads").exists());
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        Event::DownloadFinished {
            outcome: DownloadOutcome::Simulated { .. },
            ..
        }
    )));
}

#[tokio::test]
async fn missing_attachment_is_counted_as_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let uri = server.uri();
    let api = HistoryApi::with_history(
        "10",
        vec![message(1, "alice", vec![attachment(&uri, "11", "gone.png")])],
    );
    let archiver = Archiver::with_api(config(&dir, &server, &["10"]), Arc::new(api)).unwrap();

    let summary = archiver.run().await.unwrap();

    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn pacing_separates_downloads_but_not_the_last() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let uri = cdn.uri();
    let api = HistoryApi::with_history(
        "10",
        vec![
            message(2, "alice", vec![attachment(&uri, "21", "a.png")]),
            message(
                1,
                "alice",
                vec![attachment(&uri, "11", "b.png"), attachment(&uri, "12", "c.png")],
            ),
        ],
    );
    let mut config = config(&dir, &cdn, &["10"]);
    config.pacing = PacingConfig {
        base: 0.2,
        random_min: 0.0,
        random_max: 0.0,
    };
    let archiver = Archiver::with_api(config, Arc::new(api)).unwrap();
    let mut rx = archiver.subscribe();
    let start = std::time::Instant::now();

    archiver.run().await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(400));
    let paced = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, Event::Paced { .. }))
        .count();
    assert_eq!(paced, 2, "three downloads, two gaps");
}

#[tokio::test]
async fn verify_credentials_returns_user() {
    let cdn = cdn().await;
    let dir = tempdir().unwrap();
    let api = HistoryApi::with_history("10", vec![]);
    let archiver = Archiver::with_api(config(&dir, &cdn, &["10"]), Arc::new(api)).unwrap();

    let user = archiver.verify_credentials().await.unwrap();

    assert_eq!(user.username, "me");
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let dir = tempdir().unwrap();
    let config = Config {
        token: String::new(),
        download_dir: dir.path().to_path_buf(),
        channels: vec!["10".to_string()],
        ..Config::default()
    };

    let result = Archiver::with_api(config, Arc::new(HistoryApi::default()));

    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn attachment_origin_must_match_exactly() {
    let dir = tempdir().unwrap();
    let config = Config {
        token: "token".to_string(),
        download_dir: dir.path().to_path_buf(),
        channels: vec!["10".to_string()],
        ..Config::default()
    };
    let archiver = Archiver::with_api(config, Arc::new(HistoryApi::default())).unwrap();

    assert!(archiver.is_allowed_host("https://cdn.discordapp.com/attachments/1/2/a.png"));
    assert!(!archiver.is_allowed_host("http://cdn.discordapp.com/attachments/1/2/a.png"));
    assert!(!archiver.is_allowed_host("https://cdn.discordapp.com.evil.io/a.png"));
    assert!(!archiver.is_allowed_host("not a url"));
}

//! JSON fixtures shaped like Discord REST API responses

use serde_json::{Value, json};

/// Attachment bytes served by the mock CDN
pub const ATTACHMENT_BODY: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image, but close enough for a test";

/// Quoted MD5 entity tag for `body`
pub fn etag_of(body: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(body))
}

/// An attachment object whose URL points at `cdn`
pub fn attachment_json(cdn: &str, id: &str, filename: &str) -> Value {
    json!({
        "id": id,
        "filename": filename,
        "size": ATTACHMENT_BODY.len(),
        "url": format!("{cdn}/attachments/{id}/{filename}"),
        "proxy_url": format!("https://media.discordapp.net/attachments/{id}/{filename}"),
        "content_type": "image/png"
    })
}

/// A message object posted at `timestamp` (RFC 3339)
pub fn message_json(id: &str, timestamp: &str, username: &str, attachments: Vec<Value>) -> Value {
    json!({
        "id": id,
        "type": 0,
        "content": "",
        "timestamp": timestamp,
        "edited_timestamp": null,
        "author": {
            "id": format!("{username}-id"),
            "username": username,
            "global_name": null,
            "avatar": null
        },
        "attachments": attachments,
        "embeds": [],
        "pinned": false
    })
}

/// `count` attachment-less messages with ids `count..=1`, newest first
pub fn history_json(count: u64) -> Vec<Value> {
    (1..=count)
        .rev()
        .map(|id| message_json(&id.to_string(), "2024-05-01T12:00:00.000000+00:00", "alice", vec![]))
        .collect()
}

/// A server text channel
pub fn guild_channel_json(id: &str, guild_id: &str, name: &str, topic: Option<&str>) -> Value {
    json!({
        "id": id,
        "type": 0,
        "guild_id": guild_id,
        "name": name,
        "topic": topic,
        "position": 0,
        "nsfw": false
    })
}

/// A direct-message channel
pub fn dm_channel_json(id: &str) -> Value {
    json!({
        "id": id,
        "type": 1,
        "last_message_id": null,
        "recipients": [{"id": "42", "username": "friend"}]
    })
}

/// A server
pub fn guild_json(id: &str, name: &str, owner_id: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "owner_id": owner_id,
        "icon": null,
        "roles": [],
        "emojis": []
    })
}

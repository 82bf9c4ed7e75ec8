//! Utility functions for hashing, path manipulation and channel id parsing

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncReadExt;

/// Suffix appended to the final path while a transfer is in progress
pub const PART_SUFFIX: &str = ".part";

/// Read buffer size used when hashing files
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Path of the in-progress file for a final path (`<path>.part`)
///
/// # Examples
///
/// ```
/// use discord_dl::utils::part_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     part_path(Path::new("downloads/image.png")),
///     PathBuf::from("downloads/image.png.part")
/// );
/// ```
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Compute the lowercase hex MD5 digest of a file's contents
pub async fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Strip quotes and the weak-validator prefix from an `ETag` header value
///
/// Returns `None` for an empty tag.
#[must_use]
pub fn normalize_etag(raw: &str) -> Option<String> {
    let tag = raw.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    let tag = tag.trim_matches('"').to_ascii_lowercase();
    if tag.is_empty() { None } else { Some(tag) }
}

fn channel_url_regex() -> &'static Regex {
    static CHANNEL_URL: OnceLock<Regex> = OnceLock::new();
    CHANNEL_URL.get_or_init(|| {
        // literal pattern
        #[allow(clippy::expect_used)]
        Regex::new(r"^https?://(?:[a-z]+\.)?discord(?:app)?\.com/channels/(?:@me|\d+)/(\d+)")
            .expect("channel URL pattern is valid")
    })
}

/// Extract channel ids from a list of raw ids and channel URLs
///
/// Accepts bare numeric ids and `https://discord.com/channels/<guild|@me>/<channel>[/...]`
/// URLs. Entries matching neither are logged and dropped.
///
/// # Examples
///
/// ```
/// use discord_dl::utils::extract_channel_ids;
///
/// let ids = extract_channel_ids(&[
///     "111".to_string(),
///     "https://discord.com/channels/222/333".to_string(),
///     "https://discord.com/channels/@me/444".to_string(),
/// ]);
/// assert_eq!(ids, vec!["111", "333", "444"]);
/// ```
pub fn extract_channel_ids(inputs: &[String]) -> Vec<String> {
    let mut ids = Vec::with_capacity(inputs.len());
    for input in inputs {
        let trimmed = input.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            ids.push(trimmed.to_string());
        } else if let Some(captures) = channel_url_regex().captures(trimmed)
            && let Some(id) = captures.get(1)
        {
            ids.push(id.as_str().to_string());
        } else {
            tracing::warn!(input = %input, "Could not find discord channel id");
        }
    }
    ids
}

/// Format a byte count with a binary unit, e.g. `1.5 MB`
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

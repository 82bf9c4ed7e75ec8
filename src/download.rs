//! Resumable, verified attachment downloads
//!
//! Bytes are streamed into `<path>.part` and only renamed to the final path after the
//! content hash (when the server sent an entity tag) and the size have been checked.
//! A partial file left behind by a failed attempt or a killed process is resumed with a
//! byte-range request on the next attempt.

use crate::config::Config;
use crate::error::{DownloadError, Result};
use crate::types::{DownloadOutcome, Event};
use crate::utils::{md5_file, normalize_etag, part_path};
use reqwest::StatusCode;
use reqwest::header::{ETAG, RANGE};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::broadcast;

/// State of the destination before a request is made
struct LocalState {
    /// Size and hash of an existing final file
    existing: Option<(u64, String)>,
    /// Bytes already in the partial file (0 when absent or resume is off)
    resume_from: u64,
}

/// Downloads single attachments to disk
///
/// One call to [`download`](Self::download) is one attempt; callers wrap it in
/// [`crate::retry::with_retry`].
pub struct DownloadEngine {
    client: reqwest::Client,
    resume: bool,
    simulate: bool,
    events: broadcast::Sender<Event>,
}

impl DownloadEngine {
    /// Build an engine with its own HTTP client
    ///
    /// Attachment URLs are public CDN links, so this client never carries the
    /// access credential.
    pub fn new(config: &Config, events: broadcast::Sender<Event>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("discord-dl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            resume: config.resume,
            simulate: config.simulate,
            events,
        })
    }

    /// Download `url` to `dest`
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Status`] for any status other than 200/206
    /// - [`DownloadError::ExistingMismatch`] when `dest` exists and cannot be confirmed
    ///   to hold the server's content (the file is left untouched)
    /// - [`DownloadError::HashMismatch`] / [`DownloadError::SizeMismatch`] when the
    ///   transferred file fails verification (the partial file is removed)
    /// - network and I/O errors from the transfer itself (the partial file is kept)
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadOutcome> {
        let part = part_path(dest);
        let local = self.probe_local(dest, &part).await?;
        let mut offset = local.resume_from;

        let mut request = self.client.get(url);
        if offset > 0 {
            tracing::debug!(url = %url, offset, "Requesting byte range");
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = request.send().await?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();

        if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
            // The partial file is at least as long as the remote one; start over
            tracing::warn!(path = %part.display(), "Partial file longer than remote, discarding");
            fs::remove_file(&part).await?;
            return Err(DownloadError::Status {
                status: status.as_u16(),
                reason,
            }
            .into());
        }
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::Status {
                status: status.as_u16(),
                reason,
            }
            .into());
        }
        if status == StatusCode::OK && offset > 0 {
            tracing::debug!(url = %url, "Server ignored range request, restarting from zero");
            offset = 0;
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .and_then(normalize_etag);
        let total = response.content_length().map(|len| offset + len);

        if let Some((existing_size, existing_hash)) = &local.existing {
            let reason = match &etag {
                Some(tag) if tag == existing_hash => "hash matches entity tag",
                None if total == Some(*existing_size) => "size matches content length",
                _ => {
                    return Err(DownloadError::ExistingMismatch {
                        path: dest.to_path_buf(),
                    }
                    .into());
                }
            };
            tracing::info!("{} already complete ({})", dest.display(), reason);
            return Ok(DownloadOutcome::AlreadyComplete {
                reason: reason.to_string(),
            });
        }

        if self.simulate {
            tracing::info!("Simulated download of {} to {}", url, dest.display());
            return Ok(DownloadOutcome::Simulated {
                status: status.as_u16(),
                reason,
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = if offset > 0 {
            fs::OpenOptions::new().append(true).open(&part).await?
        } else {
            fs::File::create(&part).await?
        };
        let mut writer = BufWriter::new(file);

        self.emit(Event::DownloadStarted {
            path: dest.to_path_buf(),
            resume_from: offset,
            total,
        });

        let mut downloaded = offset;
        let mut written = 0u64;
        let mut last_percent = None;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            written += chunk.len() as u64;

            let percent = total.filter(|t| *t > 0).map(|t| downloaded * 100 / t);
            if percent.is_none() || percent != last_percent {
                last_percent = percent;
                self.emit(Event::DownloadProgress {
                    path: dest.to_path_buf(),
                    downloaded,
                    total,
                });
            }
        }
        writer.flush().await?;
        drop(writer);

        if let Err(e) = verify(&part, etag.as_deref(), total, downloaded).await {
            fs::remove_file(&part).await.ok();
            return Err(e);
        }

        fs::rename(&part, dest).await?;
        tracing::info!(
            path = %dest.display(),
            bytes = written,
            status = status.as_u16(),
            "Download complete"
        );

        Ok(DownloadOutcome::Downloaded {
            status: status.as_u16(),
            reason,
            bytes: written,
        })
    }

    async fn probe_local(&self, dest: &Path, part: &Path) -> Result<LocalState> {
        let existing = match fs::metadata(dest).await {
            Ok(meta) if meta.is_file() => Some((meta.len(), md5_file(dest).await?)),
            _ => None,
        };

        let resume_from = match fs::metadata(part).await {
            Ok(meta) if self.resume && meta.is_file() => meta.len(),
            _ => 0,
        };

        Ok(LocalState {
            existing,
            resume_from,
        })
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.events.send(event).ok();
    }
}

/// Check a finished partial file against the entity tag and the expected size
async fn verify(part: &Path, etag: Option<&str>, total: Option<u64>, downloaded: u64) -> Result<()> {
    if let Some(expected) = etag {
        let actual = md5_file(part).await?;
        if actual != expected {
            return Err(DownloadError::HashMismatch {
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    if let Some(expected) = total
        && expected != downloaded
    {
        return Err(DownloadError::SizeMismatch {
            expected,
            actual: downloaded,
        }
        .into());
    }

    Ok(())
}
